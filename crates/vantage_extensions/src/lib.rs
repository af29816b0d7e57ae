//! # Vantage Extensions
//!
//! Runtime side of the extension system: it registers [`DataExtension`]s, calls
//! their providers on lifecycle events and keeps the results in SQLite.
//!
//! ## Architecture
//!
//! - [`descriptor`] validates a declaration into an [`ExtensionDescriptor`]
//! - [`gatherer`] calls the providers of one extension for one subject
//! - [`store`] persists the catalog and values and answers read queries
//! - [`registry`] owns the registered extensions and hands out [`Caller`]s
//! - [`cache`] memoizes rendered JSON, invalidated after each gather
//! - [`processing`] and [`scheduler`] run gathers off the calling thread
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vantage_extensions::*;
//! use vantage_extension_api::*;
//!
//! struct Economy;
//!
//! impl DataExtension for Economy {
//!     fn declare(self: Arc<Self>) -> ExtensionDeclaration {
//!         ExtensionDeclaration::new(PluginInfo::new("Economy"))
//!             .number(ProviderInfo::new("balance", "Balance"), Method::player(|_| Ok(120)))
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ExtensionService::new(
//!     ServerUuid::new(),
//!     Arc::new(Database::open("extensions.db")?),
//!     Arc::new(MemoryExtensionSettings::new()),
//!     Arc::new(JsonCache::default()),
//!     Processing::from_current(4)?,
//!     Arc::new(ErrorLogger::new()),
//! );
//!
//! if let Some(caller) = service.register(Arc::new(Economy))? {
//!     let player = Player::new(PlayerUuid::new(), "Alice");
//!     if let Some(gather) = caller.update_player_data(player) {
//!         gather.await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod descriptor;
pub mod error;
pub mod error_logger;
pub mod gatherer;
pub mod processing;
pub mod registry;
pub mod rendering;
pub mod scheduler;
pub mod settings;
pub mod store;

pub use cache::{CacheStats, DataId, JsonCache};
pub use descriptor::{extract_descriptor, DescriptorWarning, ExtensionDescriptor, Provider};
pub use error::{DescriptorError, ExtensionError, ProviderCallError, SettingsError, StoreError};
pub use error_logger::{ErrorContext, ErrorLevel, ErrorLogger};
pub use gatherer::ProviderValueGatherer;
pub use processing::Processing;
pub use registry::{Caller, ExtensionService, ExtensionSnapshot};
pub use rendering::ExtensionJsonRenderer;
pub use scheduler::{GatherScheduler, ScheduledTask};
pub use settings::{ExtensionSettings, FileExtensionSettings, MemoryExtensionSettings};
pub use store::{Database, Query, Subject, Transaction};

pub use vantage_extension_api::DataExtension;
