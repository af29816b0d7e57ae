//! JSON documents served to the dashboard, memoized in the [`JsonCache`].

use crate::cache::{DataId, JsonCache};
use crate::error::StoreError;
use crate::store::data::ExtensionData;
use crate::store::queries::{
    ExtensionPlayerDataQuery, ExtensionServerDataQuery, ExtensionServerPlayerDataTableQuery,
};
use crate::store::Database;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use vantage_extension_api::{PlayerUuid, ServerUuid};

pub struct ExtensionJsonRenderer {
    database: Arc<Database>,
    cache: Arc<JsonCache>,
}

impl ExtensionJsonRenderer {
    pub fn new(database: Arc<Database>, cache: Arc<JsonCache>) -> Self {
        Self { database, cache }
    }

    /// Plugin names, icons and tab names of a server's extensions.
    pub fn server_navigation_json(&self, server: ServerUuid) -> Result<Arc<String>, StoreError> {
        self.cache.get_or_compute(DataId::ExtensionNav, server.0, || {
            let extensions = self.database.query(&ExtensionServerDataQuery { server })?;
            let navigation: Vec<_> = extensions
                .iter()
                .map(|extension| {
                    json!({
                        "name": extension.name(),
                        "icon": extension.information.icon,
                        "tabs": extension.tabs().iter().map(|tab| tab.information.name.as_str()).collect::<Vec<_>>(),
                    })
                })
                .collect();
            Ok(serde_json::to_string(&navigation)?)
        })
    }

    pub fn server_tabs_json(&self, server: ServerUuid) -> Result<Arc<String>, StoreError> {
        self.cache.get_or_compute(DataId::ExtensionTabs, server.0, || {
            let extensions = self.database.query(&ExtensionServerDataQuery { server })?;
            Ok(serde_json::to_string(&extensions)?)
        })
    }

    /// Players table columns keyed by player uuid.
    pub fn players_table_json(&self, server: ServerUuid, limit: usize) -> Result<Arc<String>, StoreError> {
        self.cache.get_or_compute(DataId::ExtensionPlayersTable { limit }, server.0, || {
            let table = self
                .database
                .query(&ExtensionServerPlayerDataTableQuery { server, limit })?;
            let sorted: BTreeMap<String, _> = table
                .into_iter()
                .map(|(player, values)| (player.to_string(), values))
                .collect();
            Ok(serde_json::to_string(&sorted)?)
        })
    }

    /// Extension data of one player keyed by server uuid.
    pub fn player_json(&self, player: PlayerUuid) -> Result<Arc<String>, StoreError> {
        self.cache.get_or_compute(DataId::ExtensionPlayer, player.0, || {
            let data = self.database.query(&ExtensionPlayerDataQuery { player })?;
            let sorted: BTreeMap<String, Vec<ExtensionData>> = data
                .into_iter()
                .map(|(server, extensions)| (server.to_string(), extensions))
                .collect();
            Ok(serde_json::to_string(&sorted)?)
        })
    }
}
