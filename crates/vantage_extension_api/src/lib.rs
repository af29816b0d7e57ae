//! # Vantage Extension API
//!
//! The surface third-party plugins implement to feed metrics into Vantage.
//!
//! An extension is an already constructed object implementing [`DataExtension`].
//! When it is registered, Vantage asks it once for an [`ExtensionDeclaration`]
//! listing its plugin identity, tabs and typed providers. From then on Vantage
//! calls the providers on the lifecycle events the extension subscribed to and
//! stores the values.
//!
//! ## Quick Start Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vantage_extension_api::*;
//!
//! struct Economy;
//!
//! impl DataExtension for Economy {
//!     fn declare(self: Arc<Self>) -> ExtensionDeclaration {
//!         ExtensionDeclaration::new(PluginInfo::new("Economy").icon(Icon::called("coins")))
//!             .number(
//!                 ProviderInfo::new("balance", "Balance").show_in_players_table(),
//!                 Method::player(|_player| Ok(120)),
//!             )
//!             .condition(
//!                 ProviderInfo::new("has_bank", "Has a bank account"),
//!                 "banked",
//!                 Method::player(|_player| Ok(true)),
//!             )
//!             .number(
//!                 ProviderInfo::new("savings", "Savings").conditional(Conditional::new("banked")),
//!                 Method::player(|_player| Ok(5_000)),
//!             )
//!     }
//! }
//!
//! let declaration = Arc::new(Economy).declare();
//! assert_eq!(declaration.plugin.name, "Economy");
//! ```
//!
//! ## Conditions
//!
//! A boolean provider may publish a condition name. When its value is `true` the
//! condition `name` is satisfied, otherwise `not_name` is. Providers marked
//! [`Conditional`] are only called, and their values only kept, while their
//! condition is satisfied for the same subject.

pub mod provider;
pub mod table;
pub mod types;
pub mod utils;

pub use provider::*;
pub use table::{Table, TableBuilder, TableColumn, MAX_COLUMNS};
pub use types::*;
pub use utils::{current_timestamp, current_timestamp_millis, truncate};

use std::sync::Arc;

/// An object that supplies metric providers.
///
/// `declare` is called once per registration. Provider closures may capture a
/// clone of `self` to reach the extension's state.
pub trait DataExtension: Send + Sync + 'static {
    fn declare(self: Arc<Self>) -> ExtensionDeclaration;
}
