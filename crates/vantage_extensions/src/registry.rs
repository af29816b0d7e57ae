//! # Extension Registry
//!
//! [`ExtensionService`] owns the registered extensions of one server and
//! dispatches lifecycle events to their gatherers.
//!
//! The service is constructed explicitly and shared behind an [`Arc`].
//! Registration hands the extension a [`Caller`] holding only a weak reference,
//! so a dropped service simply turns callers into no-ops.

use crate::cache::{DataId, JsonCache};
use crate::descriptor::{extract_descriptor, Provider, MAX_NAME_LENGTH};
use crate::error::{ExtensionError, StoreError};
use crate::error_logger::{ErrorContext, ErrorLevel, ErrorLogger};
use crate::gatherer::ProviderValueGatherer;
use crate::processing::Processing;
use crate::settings::ExtensionSettings;
use crate::store::transactions::RemoveUnsatisfiedConditionalResultsTransaction;
use crate::store::Database;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vantage_extension_api::{truncate, CallEvents, DataExtension, Player, ServerUuid};

/// Providers of one registered extension, split by their runtime state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionSnapshot {
    pub plugin: String,
    pub enabled_providers: Vec<String>,
    pub disabled_providers: Vec<String>,
    pub call_events: Vec<String>,
}

pub struct ExtensionService {
    server_uuid: ServerUuid,
    database: Arc<Database>,
    settings: Arc<dyn ExtensionSettings>,
    cache: Arc<JsonCache>,
    processing: Processing,
    error_logger: Arc<ErrorLogger>,
    extension_gatherers: DashMap<String, Arc<ProviderValueGatherer>>,
}

impl ExtensionService {
    pub fn new(
        server_uuid: ServerUuid,
        database: Arc<Database>,
        settings: Arc<dyn ExtensionSettings>,
        cache: Arc<JsonCache>,
        processing: Processing,
        error_logger: Arc<ErrorLogger>,
    ) -> Arc<Self> {
        Arc::new(Self {
            server_uuid,
            database,
            settings,
            cache,
            processing,
            error_logger,
            extension_gatherers: DashMap::new(),
        })
    }

    pub fn server_uuid(&self) -> ServerUuid {
        self.server_uuid
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn cache(&self) -> &Arc<JsonCache> {
        &self.cache
    }

    pub fn error_logger(&self) -> &Arc<ErrorLogger> {
        &self.error_logger
    }

    // ============================================================================
    // Registration
    // ============================================================================

    /// Registers an extension and schedules its first server gather.
    ///
    /// Returns `Ok(None)` when the extension is disabled in the settings. A
    /// missing settings section is created as enabled first.
    pub fn register(self: &Arc<Self>, extension: Arc<dyn DataExtension>) -> Result<Option<Caller>, ExtensionError> {
        let (descriptor, warnings) = extract_descriptor(&extension)?;
        let plugin_name = descriptor.name().to_string();

        if !self.settings.has_section(&plugin_name) {
            self.settings.create_section(&plugin_name)?;
        }
        if !self.settings.is_enabled(&plugin_name) {
            debug!(plugin = %plugin_name, "Extension is disabled in the settings, not registering");
            return Ok(None);
        }
        for warning in &warnings {
            warn!(plugin = %plugin_name, "Extension declaration problem: {}", warning);
        }

        let gatherer = Arc::new(ProviderValueGatherer::new(
            Arc::new(descriptor),
            Arc::clone(&self.database),
            self.server_uuid,
            Arc::clone(&self.error_logger),
        ));
        if let Err(e) = gatherer.store_extension_info() {
            self.log_store_error(&plugin_name, &e, "registering");
            return Err(e.into());
        }
        self.extension_gatherers.insert(plugin_name.clone(), Arc::clone(&gatherer));
        info!(plugin = %plugin_name, "Registered extension");

        if !gatherer.should_skip_event(CallEvents::ServerExtensionRegister) {
            let service = Arc::downgrade(self);
            let plugin = plugin_name.clone();
            self.processing.submit_non_critical(move || {
                if let Some(service) = service.upgrade() {
                    if let Err(e) = service.update_server_values_of(&plugin, CallEvents::ServerExtensionRegister) {
                        debug!(plugin = %plugin, error = %e, "Initial server gather failed");
                    }
                }
            });
        }

        Ok(Some(Caller {
            service: Arc::downgrade(self),
            plugin_name,
        }))
    }

    /// Removes the extension from the live registry. Stored values stay.
    pub fn unregister(&self, plugin_name: &str) -> bool {
        let removed = self.extension_gatherers.remove(plugin_name).is_some();
        if removed {
            info!(plugin = %plugin_name, "Unregistered extension");
        }
        removed
    }

    /// Unregisters by asking the extension for its plugin name.
    pub fn unregister_extension(&self, extension: &Arc<dyn DataExtension>) -> bool {
        let declaration = Arc::clone(extension).declare();
        self.unregister(&truncate(&declaration.plugin.name, MAX_NAME_LENGTH))
    }

    pub fn is_registered(&self, plugin_name: &str) -> bool {
        self.extension_gatherers.contains_key(plugin_name)
    }

    /// Registered plugin names, sorted.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.extension_gatherers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn registered_extensions(&self) -> Vec<ExtensionSnapshot> {
        let mut snapshots: Vec<ExtensionSnapshot> = self
            .gatherers()
            .iter()
            .map(|gatherer| {
                let descriptor = gatherer.descriptor();
                let (enabled, disabled): (Vec<_>, Vec<_>) =
                    descriptor.all_providers().partition(|provider| provider.is_enabled());
                let label = |provider: &Provider| format!("{}:{}", provider.scope(), provider.name());
                let mut call_events: Vec<String> = descriptor.call_events().iter().map(ToString::to_string).collect();
                call_events.sort();
                ExtensionSnapshot {
                    plugin: descriptor.name().to_string(),
                    enabled_providers: enabled.into_iter().map(label).collect(),
                    disabled_providers: disabled.into_iter().map(label).collect(),
                    call_events,
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.plugin.cmp(&b.plugin));
        snapshots
    }

    /// Drops every registered extension and stops accepting background work.
    pub fn shutdown(&self) {
        self.extension_gatherers.clear();
        self.processing.shutdown();
        info!("Extension service shut down");
    }

    // ============================================================================
    // Gathering
    // ============================================================================

    /// Gathers player values of every registered extension subscribed to `event`.
    pub fn update_player_values(&self, player: &Player, event: CallEvents) {
        if player.uuid.is_nil() {
            return;
        }
        for gatherer in self.gatherers() {
            if let Err(e) = self.gather_player(&gatherer, player, event) {
                debug!(plugin = %gatherer.plugin_name(), error = %e, "Player gather failed");
            }
        }
    }

    /// Gathers server values of every registered extension subscribed to `event`.
    pub fn update_server_values(&self, event: CallEvents) {
        for gatherer in self.gatherers() {
            if let Err(e) = self.gather_server(&gatherer, event) {
                debug!(plugin = %gatherer.plugin_name(), error = %e, "Server gather failed");
            }
        }
    }

    /// Player gather of one extension. Unknown extensions are ignored.
    pub fn update_player_values_of(&self, plugin_name: &str, player: &Player, event: CallEvents) -> Result<(), StoreError> {
        if player.uuid.is_nil() {
            return Ok(());
        }
        match self.gatherer(plugin_name) {
            Some(gatherer) => self.gather_player(&gatherer, player, event),
            None => {
                debug!(plugin = %plugin_name, "Ignoring player update of an unregistered extension");
                Ok(())
            }
        }
    }

    /// Server gather of one extension. Unknown extensions are ignored.
    pub fn update_server_values_of(&self, plugin_name: &str, event: CallEvents) -> Result<(), StoreError> {
        match self.gatherer(plugin_name) {
            Some(gatherer) => self.gather_server(&gatherer, event),
            None => {
                debug!(plugin = %plugin_name, "Ignoring server update of an unregistered extension");
                Ok(())
            }
        }
    }

    /// Removes unsatisfied conditional results of every extension and subject.
    pub fn remove_unsatisfied_conditionals(&self) -> Result<(), StoreError> {
        let result = self
            .database
            .execute_transaction(&RemoveUnsatisfiedConditionalResultsTransaction::everything());
        if let Err(e) = &result {
            self.log_store_error("all extensions", e, "cleaning up conditional values");
        }
        self.invalidate_server_json();
        self.cache.invalidate_matching(|id, _| {
            matches!(id, DataId::ExtensionPlayer | DataId::ExtensionPlayersTable { .. })
        });
        result
    }

    fn gather_player(&self, gatherer: &ProviderValueGatherer, player: &Player, event: CallEvents) -> Result<(), StoreError> {
        if gatherer.should_skip_event(event) {
            return Ok(());
        }
        let result = gatherer.update_player_values(player, event);
        if let Err(e) = &result {
            self.log_store_error(gatherer.plugin_name(), e, &format!("storing values of {}", player.name));
        }
        self.cache.invalidate(DataId::ExtensionPlayer, player.uuid.0);
        self.cache.invalidate_matching(|id, key| {
            matches!(id, DataId::ExtensionPlayersTable { .. }) && *key == self.server_uuid.0
        });
        // Server tabs carry aggregates of player values.
        self.invalidate_server_json();
        result
    }

    fn gather_server(&self, gatherer: &ProviderValueGatherer, event: CallEvents) -> Result<(), StoreError> {
        if gatherer.should_skip_event(event) {
            return Ok(());
        }
        let result = gatherer.update_server_values(event);
        if let Err(e) = &result {
            self.log_store_error(gatherer.plugin_name(), e, "storing server values");
        }
        self.invalidate_server_json();
        result
    }

    fn invalidate_server_json(&self) {
        self.cache.invalidate(DataId::ExtensionNav, self.server_uuid.0);
        self.cache.invalidate(DataId::ExtensionTabs, self.server_uuid.0);
    }

    fn log_store_error(&self, plugin_name: &str, e: &StoreError, action: &str) {
        self.error_logger.log(
            ErrorLevel::Error,
            e,
            ErrorContext::new()
                .related(plugin_name)
                .related(action)
                .what_to_do("Check that the database is reachable and writable."),
        );
    }

    fn gatherer(&self, plugin_name: &str) -> Option<Arc<ProviderValueGatherer>> {
        self.extension_gatherers
            .get(plugin_name)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of the gatherers, so no map shard stays locked while gathering.
    fn gatherers(&self) -> Vec<Arc<ProviderValueGatherer>> {
        self.extension_gatherers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

/// Handle an extension uses to request a gather on its own schedule.
#[derive(Clone)]
pub struct Caller {
    service: Weak<ExtensionService>,
    plugin_name: String,
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller").field("plugin_name", &self.plugin_name).finish()
    }
}

impl Caller {
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Queues a player gather. Returns `None` when the extension is no longer registered.
    pub fn update_player_data(&self, player: Player) -> Option<JoinHandle<()>> {
        self.submit(move |service, plugin| {
            if let Err(e) = service.update_player_values_of(plugin, &player, CallEvents::Manual) {
                debug!(plugin = %plugin, error = %e, "Requested player gather failed");
            }
        })
    }

    /// Queues a server gather. Returns `None` when the extension is no longer registered.
    pub fn update_server_data(&self) -> Option<JoinHandle<()>> {
        self.submit(|service, plugin| {
            if let Err(e) = service.update_server_values_of(plugin, CallEvents::Manual) {
                debug!(plugin = %plugin, error = %e, "Requested server gather failed");
            }
        })
    }

    fn submit<F>(&self, job: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(&ExtensionService, &str) + Send + 'static,
    {
        let service = self.service.upgrade()?;
        if !service.is_registered(&self.plugin_name) {
            debug!(plugin = %self.plugin_name, "Caller used after the extension was unregistered");
            return None;
        }
        let weak = Weak::clone(&self.service);
        let plugin = self.plugin_name.clone();
        Some(service.processing.submit_non_critical(move || {
            if let Some(service) = weak.upgrade() {
                job(&service, &plugin);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryExtensionSettings;
    use crate::store::Transaction;
    use std::time::Duration;
    use vantage_extension_api::{ExtensionDeclaration, Method, PlayerUuid, PluginInfo, ProviderInfo};

    struct Counter(&'static str);

    impl DataExtension for Counter {
        fn declare(self: Arc<Self>) -> ExtensionDeclaration {
            ExtensionDeclaration::new(PluginInfo::new(self.0))
                .call_events([CallEvents::PlayerJoin])
                .number(ProviderInfo::new("value", "Value"), Method::player(|_| Ok(1)))
        }
    }

    struct RenamePlugins;

    impl Transaction for RenamePlugins {
        fn execute(&self, tx: &rusqlite::Transaction<'_>) -> Result<(), StoreError> {
            tx.execute("UPDATE extension_plugins SET name = name || '-renamed'", [])?;
            Ok(())
        }
    }

    /// Renames its own catalog row while being gathered, so storing fails.
    struct Unstorable(Arc<Database>);

    impl DataExtension for Unstorable {
        fn declare(self: Arc<Self>) -> ExtensionDeclaration {
            let database = Arc::clone(&self.0);
            ExtensionDeclaration::new(PluginInfo::new("Unstorable"))
                .call_events([CallEvents::ServerExtensionRegister])
                .number(
                    ProviderInfo::new("value", "Value"),
                    Method::server(move || {
                        database.execute_transaction(&RenamePlugins)?;
                        Ok(1)
                    }),
                )
        }
    }

    fn service() -> Arc<ExtensionService> {
        service_on(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn service_on(database: Arc<Database>) -> Arc<ExtensionService> {
        ExtensionService::new(
            ServerUuid::new(),
            database,
            Arc::new(MemoryExtensionSettings::new()),
            Arc::new(JsonCache::default()),
            Processing::from_current(2).unwrap(),
            Arc::new(ErrorLogger::new()),
        )
    }

    #[tokio::test]
    async fn test_unregister_removes_gatherer() {
        let service = service();
        let caller = service.register(Arc::new(Counter("Counter"))).unwrap().unwrap();
        assert_eq!(service.registered_names(), vec!["Counter".to_string()]);

        assert!(service.unregister("Counter"));
        assert!(!service.unregister("Counter"));
        assert!(caller.update_server_data().is_none());
    }

    #[tokio::test]
    async fn test_unregister_by_extension_object() {
        let service = service();
        let extension: Arc<dyn DataExtension> = Arc::new(Counter("Counter"));
        service.register(Arc::clone(&extension)).unwrap();

        assert!(service.is_registered("Counter"));
        assert!(service.unregister_extension(&extension));
        assert!(!service.is_registered("Counter"));
    }

    #[tokio::test]
    async fn test_snapshot_lists_providers() {
        let service = service();
        service.register(Arc::new(Counter("B"))).unwrap();
        service.register(Arc::new(Counter("A"))).unwrap();

        let snapshots = service.registered_extensions();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].plugin, "A");
        assert_eq!(snapshots[0].enabled_providers, vec!["player:value".to_string()]);
        assert!(snapshots[0].disabled_providers.is_empty());
        assert_eq!(snapshots[0].call_events, vec!["PLAYER_JOIN".to_string()]);
    }

    #[tokio::test]
    async fn test_nil_player_is_ignored() {
        let service = service();
        service.register(Arc::new(Counter("Counter"))).unwrap();
        let nil = Player::new(PlayerUuid(uuid::Uuid::nil()), "nobody");

        service.update_player_values(&nil, CallEvents::Manual);
        assert!(service.update_player_values_of("Counter", &nil, CallEvents::Manual).is_ok());
        assert_eq!(service.error_logger().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_registration_gather_is_reported() {
        let database = Arc::new(Database::open_in_memory().unwrap());
        let service = service_on(Arc::clone(&database));
        service.register(Arc::new(Unstorable(database))).unwrap().unwrap();

        for _ in 0..200 {
            if service.error_logger().count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(service.error_logger().count(), 1);
        assert!(service.error_logger().recent()[0].message.contains("Unstorable"));
    }
}
