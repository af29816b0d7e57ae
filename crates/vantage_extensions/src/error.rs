//! Error types for registration, gathering and storage.

use vantage_extension_api::{CallEvents, Scope};

/// An extension declaration that cannot be registered.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// The declaration has no plugin name
    #[error("Extension declares no plugin name")]
    MissingPluginName,
    /// Two providers of the same scope share a name
    #[error("Extension '{plugin}' declares {scope} provider '{provider}' more than once")]
    DuplicateProvider {
        plugin: String,
        scope: Scope,
        provider: String,
    },
    /// A provider declaration is structurally invalid
    #[error("Extension '{plugin}' has an invalid provider '{provider}': {reason}")]
    InvalidProvider {
        plugin: String,
        provider: String,
        reason: String,
    },
}

/// Failure reading from or writing to the result store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite reported an error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Stored JSON could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A value was written for a provider missing from the catalog
    #[error("Provider '{provider}' of '{plugin}' is not in the catalog")]
    UnknownProvider { plugin: String, provider: String },
    /// A plugin was referenced before its catalog row was stored
    #[error("Plugin '{0}' is not in the catalog")]
    UnknownPlugin(String),
}

/// A provider method returned an error or panicked.
#[derive(Debug, thiserror::Error)]
#[error("{plugin} has a broken provider '{provider}' ({event}): {cause}")]
pub struct ProviderCallError {
    pub plugin: String,
    pub provider: String,
    pub event: CallEvents,
    pub cause: String,
}

/// Failure loading or persisting extension settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Settings file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Settings write error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top level error of the extension service.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
