//! Write transactions against the result store.

use super::values::GatheredValue;
use super::{plugin_id, provider_id, Subject, Transaction};
use crate::descriptor::ExtensionDescriptor;
use crate::error::StoreError;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashMap;
use tracing::debug;
use vantage_extension_api::{
    current_timestamp_millis, Color, ElementOrder, FormatType, ProviderValue, Scope, ServerUuid,
};

const VALUE_TABLES: [&str; 3] = ["extension_values", "extension_groups", "extension_table_rows"];

// ============================================================================
// Catalog
// ============================================================================

/// Stores plugin identity, tabs and providers of a descriptor.
///
/// Re-storing an extension clears the `disabled` flag of its providers.
pub struct StoreExtensionInformationTransaction<'a> {
    server: ServerUuid,
    descriptor: &'a ExtensionDescriptor,
}

impl<'a> StoreExtensionInformationTransaction<'a> {
    pub fn new(server: ServerUuid, descriptor: &'a ExtensionDescriptor) -> Self {
        Self { server, descriptor }
    }

    fn store_plugin(&self, conn: &Connection) -> Result<i64, StoreError> {
        let plugin = self.descriptor.plugin();
        let server = self.server.to_string();
        let now = current_timestamp_millis();
        let updated = conn.execute(
            "UPDATE extension_plugins SET last_updated = ?1, icon_name = ?2, icon_family = ?3, icon_color = ?4
             WHERE name = ?5 AND server_uuid = ?6",
            params![
                now,
                plugin.icon.name,
                plugin.icon.family.as_str(),
                plugin.icon.color.as_str(),
                plugin.name,
                server
            ],
        )?;
        if updated == 0 {
            conn.execute(
                "INSERT INTO extension_plugins (name, server_uuid, last_updated, icon_name, icon_family, icon_color)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    plugin.name,
                    server,
                    now,
                    plugin.icon.name,
                    plugin.icon.family.as_str(),
                    plugin.icon.color.as_str()
                ],
            )?;
        }
        plugin_id(conn, self.server, &plugin.name)
    }

    fn store_tabs(&self, conn: &Connection, plugin_id: i64) -> Result<HashMap<String, i64>, StoreError> {
        let mut tab_ids = HashMap::new();
        for tab in self.descriptor.tabs() {
            let element_order = ElementOrder::serialize_order(&tab.info.element_order);
            let updated = conn.execute(
                "UPDATE extension_tabs SET element_order = ?1, priority = ?2, icon_name = ?3, icon_family = ?4, icon_color = ?5
                 WHERE plugin_id = ?6 AND name = ?7",
                params![
                    element_order,
                    tab.priority,
                    tab.info.icon.name,
                    tab.info.icon.family.as_str(),
                    tab.info.icon.color.as_str(),
                    plugin_id,
                    tab.info.name
                ],
            )?;
            if updated == 0 {
                conn.execute(
                    "INSERT INTO extension_tabs (plugin_id, name, element_order, priority, icon_name, icon_family, icon_color)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        plugin_id,
                        tab.info.name,
                        element_order,
                        tab.priority,
                        tab.info.icon.name,
                        tab.info.icon.family.as_str(),
                        tab.info.icon.color.as_str()
                    ],
                )?;
            }
            let id: i64 = conn.query_row(
                "SELECT id FROM extension_tabs WHERE plugin_id = ?1 AND name = ?2",
                params![plugin_id, tab.info.name],
                |row| row.get(0),
            )?;
            tab_ids.insert(tab.info.name.clone(), id);
        }
        Ok(tab_ids)
    }

    fn store_providers(
        &self,
        conn: &Connection,
        plugin_id: i64,
        tab_ids: &HashMap<String, i64>,
    ) -> Result<(), StoreError> {
        for provider in self.descriptor.all_providers() {
            let info = provider.info();
            let options = KindOptions::of(provider.value());
            let tab_id = info.tab.as_ref().and_then(|tab| tab_ids.get(tab)).copied();
            let condition_name = info.condition.as_ref().map(|condition| condition.satisfied_by());
            let provided_condition = provider.value().provided_condition();
            let scope = provider.scope().as_str();

            let updated = conn.execute(
                "UPDATE extension_providers SET kind = ?1, text = ?2, description = ?3, priority = ?4,
                    icon_name = ?5, icon_family = ?6, icon_color = ?7, tab_id = ?8, condition_name = ?9,
                    provided_condition = ?10, hidden = ?11, show_in_players_table = ?12, format_type = ?13,
                    is_player_name = ?14, table_color = ?15, disabled = 0
                 WHERE plugin_id = ?16 AND scope = ?17 AND name = ?18",
                params![
                    provider.kind().as_str(),
                    info.text,
                    info.description,
                    info.priority,
                    info.icon.name,
                    info.icon.family.as_str(),
                    info.icon.color.as_str(),
                    tab_id,
                    condition_name,
                    provided_condition,
                    options.hidden,
                    info.show_in_players_table,
                    options.format.as_str(),
                    options.player_name,
                    options.table_color.as_str(),
                    plugin_id,
                    scope,
                    info.name
                ],
            )?;
            if updated == 0 {
                conn.execute(
                    "INSERT INTO extension_providers (plugin_id, scope, name, kind, text, description, priority,
                        icon_name, icon_family, icon_color, tab_id, condition_name, provided_condition, hidden,
                        show_in_players_table, format_type, is_player_name, table_color)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                    params![
                        plugin_id,
                        scope,
                        info.name,
                        provider.kind().as_str(),
                        info.text,
                        info.description,
                        info.priority,
                        info.icon.name,
                        info.icon.family.as_str(),
                        info.icon.color.as_str(),
                        tab_id,
                        condition_name,
                        provided_condition,
                        options.hidden,
                        info.show_in_players_table,
                        options.format.as_str(),
                        options.player_name,
                        options.table_color.as_str()
                    ],
                )?;
            }
        }
        Ok(())
    }
}

impl Transaction for StoreExtensionInformationTransaction<'_> {
    fn execute(&self, tx: &rusqlite::Transaction<'_>) -> Result<(), StoreError> {
        let plugin_id = self.store_plugin(tx)?;
        let tab_ids = self.store_tabs(tx, plugin_id)?;
        self.store_providers(tx, plugin_id, &tab_ids)?;
        debug!(
            plugin = %self.descriptor.plugin().name,
            tabs = tab_ids.len(),
            "Stored extension catalog"
        );
        Ok(())
    }
}

/// Kind specific catalog columns.
struct KindOptions {
    hidden: bool,
    format: FormatType,
    player_name: bool,
    table_color: Color,
}

impl KindOptions {
    fn of(value: &ProviderValue) -> Self {
        let mut options = KindOptions {
            hidden: false,
            format: FormatType::None,
            player_name: false,
            table_color: Color::None,
        };
        match value {
            ProviderValue::Boolean { hidden, .. } => options.hidden = *hidden,
            ProviderValue::Number { format, .. } => options.format = *format,
            ProviderValue::String { player_name, .. } => options.player_name = *player_name,
            ProviderValue::Table { color, .. } => options.table_color = *color,
            ProviderValue::Double(_) | ProviderValue::Percentage(_) | ProviderValue::Group(_) => {}
        }
        options
    }
}

/// Removes providers the extension lists as invalidated, along with their values.
pub struct RemoveInvalidResultsTransaction {
    server: ServerUuid,
    plugin: String,
    provider_names: Vec<String>,
}

impl RemoveInvalidResultsTransaction {
    pub fn new(server: ServerUuid, plugin: impl Into<String>, provider_names: Vec<String>) -> Self {
        Self {
            server,
            plugin: plugin.into(),
            provider_names,
        }
    }
}

impl Transaction for RemoveInvalidResultsTransaction {
    fn execute(&self, tx: &rusqlite::Transaction<'_>) -> Result<(), StoreError> {
        let plugin_id = match plugin_id(tx, self.server, &self.plugin) {
            Ok(id) => id,
            Err(StoreError::UnknownPlugin(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        for name in &self.provider_names {
            let ids: Vec<i64> = tx
                .prepare("SELECT id FROM extension_providers WHERE plugin_id = ?1 AND name = ?2")?
                .query_map(params![plugin_id, name], |row| row.get(0))?
                .collect::<Result<_, _>>()?;
            for id in ids {
                for table in VALUE_TABLES {
                    tx.execute(&format!("DELETE FROM {table} WHERE provider_id = ?1"), params![id])?;
                }
                tx.execute("DELETE FROM extension_providers WHERE id = ?1", params![id])?;
                debug!(plugin = %self.plugin, provider = %name, "Removed invalidated provider");
            }
        }
        Ok(())
    }
}

/// Marks a provider disabled so reads skip its values.
pub struct DisableProviderTransaction {
    server: ServerUuid,
    plugin: String,
    scope: Scope,
    provider: String,
}

impl DisableProviderTransaction {
    pub fn new(server: ServerUuid, plugin: impl Into<String>, scope: Scope, provider: impl Into<String>) -> Self {
        Self {
            server,
            plugin: plugin.into(),
            scope,
            provider: provider.into(),
        }
    }
}

impl Transaction for DisableProviderTransaction {
    fn execute(&self, tx: &rusqlite::Transaction<'_>) -> Result<(), StoreError> {
        let id = provider_id(tx, self.server, &self.plugin, self.scope, &self.provider)?;
        tx.execute("UPDATE extension_providers SET disabled = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }
}

// ============================================================================
// Values
// ============================================================================

/// Stores the values of one gather pass for one subject.
///
/// Results of the same extension and subject whose condition the new values no
/// longer satisfy are removed before the transaction commits, so readers never
/// see a value next to its reversed counterpart.
pub struct StoreResultsTransaction {
    server: ServerUuid,
    plugin: String,
    subject: Subject,
    results: Vec<(String, GatheredValue)>,
}

impl StoreResultsTransaction {
    pub fn new(
        server: ServerUuid,
        plugin: impl Into<String>,
        subject: Subject,
        results: Vec<(String, GatheredValue)>,
    ) -> Self {
        Self {
            server,
            plugin: plugin.into(),
            subject,
            results,
        }
    }
}

impl Transaction for StoreResultsTransaction {
    fn execute(&self, tx: &rusqlite::Transaction<'_>) -> Result<(), StoreError> {
        let scope = self.subject.scope();
        for (provider, value) in &self.results {
            let id = provider_id(tx, self.server, &self.plugin, scope, provider)?;
            value.store(tx, id, &self.subject)?;
        }
        RemoveUnsatisfiedConditionalResultsTransaction::new(CleanupScope::Subject {
            server: self.server,
            plugin: self.plugin.clone(),
            subject: self.subject,
        })
        .execute(tx)
    }
}

/// Which stored results a conditional cleanup looks at.
#[derive(Debug, Clone, PartialEq)]
pub enum CleanupScope {
    Everything,
    /// Every result of one scope, on every server
    Scope(Scope),
    /// Results of one extension for one subject
    Subject {
        server: ServerUuid,
        plugin: String,
        subject: Subject,
    },
}

/// Deletes results whose condition is no longer satisfied.
///
/// A condition is satisfied when a boolean provider of the same extension and
/// scope has a stored value for the same subject that publishes the condition's
/// name. Results without a condition are never touched. Removal repeats until
/// nothing changes, so results depending on removed booleans go as well.
pub struct RemoveUnsatisfiedConditionalResultsTransaction {
    scope: CleanupScope,
}

impl RemoveUnsatisfiedConditionalResultsTransaction {
    pub fn new(scope: CleanupScope) -> Self {
        Self { scope }
    }

    pub fn everything() -> Self {
        Self::new(CleanupScope::Everything)
    }

    fn filter(&self) -> (&'static str, Vec<String>) {
        match &self.scope {
            CleanupScope::Everything => ("", Vec::new()),
            CleanupScope::Scope(scope) => ("AND p.scope = ?1", vec![scope.as_str().to_string()]),
            CleanupScope::Subject {
                server,
                plugin,
                subject,
            } => (
                "AND e.name = ?1 AND e.server_uuid = ?2 AND p.scope = ?3 AND r.subject_uuid = ?4",
                vec![
                    plugin.clone(),
                    server.to_string(),
                    subject.scope().as_str().to_string(),
                    subject.key(),
                ],
            ),
        }
    }
}

impl Transaction for RemoveUnsatisfiedConditionalResultsTransaction {
    fn execute(&self, tx: &rusqlite::Transaction<'_>) -> Result<(), StoreError> {
        let (filter, parameters) = self.filter();
        let mut removed_total = 0;
        loop {
            let mut removed = 0;
            for table in VALUE_TABLES {
                let sql = format!(
                    "DELETE FROM {table} WHERE id IN (
                        SELECT r.id FROM {table} r
                        JOIN extension_providers p ON p.id = r.provider_id
                        JOIN extension_plugins e ON e.id = p.plugin_id
                        WHERE p.condition_name IS NOT NULL {filter}
                          AND NOT EXISTS (
                            SELECT 1 FROM extension_values cv
                            JOIN extension_providers cp ON cp.id = cv.provider_id
                            WHERE cp.plugin_id = p.plugin_id
                              AND cp.scope = p.scope
                              AND cp.provided_condition IS NOT NULL
                              AND cv.subject_uuid = r.subject_uuid
                              AND cv.boolean_value IS NOT NULL
                              AND CASE WHEN cv.boolean_value = 1
                                       THEN cp.provided_condition
                                       ELSE 'not_' || cp.provided_condition END = p.condition_name
                          )
                    )"
                );
                removed += tx.execute(&sql, params_from_iter(parameters.iter()))?;
            }
            removed_total += removed;
            if removed == 0 {
                break;
            }
        }
        if removed_total > 0 {
            debug!(scope = ?self.scope, removed = removed_total, "Removed unsatisfied conditional results");
        }
        Ok(())
    }
}

/// Removes every stored value. The catalog is kept.
pub struct RemoveEverythingTransaction;

impl Transaction for RemoveEverythingTransaction {
    fn execute(&self, tx: &rusqlite::Transaction<'_>) -> Result<(), StoreError> {
        for table in VALUE_TABLES {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        Ok(())
    }
}

/// Removes the values stored for one server's extensions. The catalog is kept.
pub struct RemoveServerValuesTransaction {
    server: ServerUuid,
}

impl RemoveServerValuesTransaction {
    pub fn new(server: ServerUuid) -> Self {
        Self { server }
    }
}

impl Transaction for RemoveServerValuesTransaction {
    fn execute(&self, tx: &rusqlite::Transaction<'_>) -> Result<(), StoreError> {
        let server = self.server.to_string();
        for table in VALUE_TABLES {
            tx.execute(
                &format!(
                    "DELETE FROM {table} WHERE provider_id IN (
                        SELECT p.id FROM extension_providers p
                        JOIN extension_plugins e ON e.id = p.plugin_id
                        WHERE e.server_uuid = ?1
                    )"
                ),
                params![server],
            )?;
        }
        Ok(())
    }
}
