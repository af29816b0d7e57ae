//! Read queries building the [`ExtensionData`] read model.
//!
//! Disabled providers are invisible to every query here. Aggregates over player
//! values are computed on read and never stored.

use super::data::{
    DataValue, ExtensionBooleanData, ExtensionCatalogEntry, ExtensionData, ExtensionDescription,
    ExtensionDoubleData, ExtensionInformation, ExtensionNumberData, ExtensionStringData,
    ExtensionTabData, ExtensionTabInformation, ExtensionTableData,
};
use super::values::StoredColumn;
use super::Query;
use crate::error::StoreError;
use rusqlite::{params, Connection, Row};
use std::collections::{BTreeMap, HashMap};
use vantage_extension_api::{
    Color, ElementOrder, Family, FormatType, Icon, PlayerUuid, Scope, ServerUuid, TableColumn,
    ValueKind,
};

// ============================================================================
// Queries
// ============================================================================

/// Server values, aggregates over player values and server tables of every
/// extension on a server.
pub struct ExtensionServerDataQuery {
    pub server: ServerUuid,
}

impl Query for ExtensionServerDataQuery {
    type Output = Vec<ExtensionData>;

    fn run(&self, conn: &Connection) -> Result<Vec<ExtensionData>, StoreError> {
        let catalog = Catalog::load(conn, self.server)?;
        let key = self.server.to_string();

        let mut values = subject_values(conn, &catalog, Scope::Server, &key)?;
        values.extend(aggregates(conn, &catalog, self.server)?);
        values.extend(group_counts(conn, &catalog, self.server)?);
        values.extend(subject_tables(conn, &catalog, Scope::Server, &key)?);
        Ok(catalog.assemble(values))
    }
}

/// Everything stored about one player, per server.
pub struct ExtensionPlayerDataQuery {
    pub player: PlayerUuid,
}

impl Query for ExtensionPlayerDataQuery {
    type Output = HashMap<ServerUuid, Vec<ExtensionData>>;

    fn run(&self, conn: &Connection) -> Result<Self::Output, StoreError> {
        let key = self.player.to_string();
        let servers: Vec<String> = conn
            .prepare("SELECT DISTINCT server_uuid FROM extension_plugins")?
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        let mut data = HashMap::new();
        for server in servers {
            let Ok(server) = server.parse::<ServerUuid>() else {
                continue;
            };
            let catalog = Catalog::load(conn, server)?;
            let mut values = subject_values(conn, &catalog, Scope::Player, &key)?;
            values.extend(subject_groups(conn, &catalog, &key)?);
            values.extend(subject_tables(conn, &catalog, Scope::Player, &key)?);

            let extensions = catalog.assemble(values);
            if !extensions.is_empty() {
                data.insert(server, extensions);
            }
        }
        Ok(data)
    }
}

/// Values of providers shown in the players table, for the `limit` players
/// whose values were written most recently.
pub struct ExtensionServerPlayerDataTableQuery {
    pub server: ServerUuid,
    pub limit: usize,
}

impl Query for ExtensionServerPlayerDataTableQuery {
    type Output = HashMap<PlayerUuid, ExtensionTabData>;

    fn run(&self, conn: &Connection) -> Result<Self::Output, StoreError> {
        let mut catalog = Catalog::load(conn, self.server)?;
        catalog.providers.retain(|_, provider| {
            provider.scope == Scope::Player && provider.show_in_players_table && provider.kind != ValueKind::Table
        });
        if catalog.providers.is_empty() {
            return Ok(HashMap::new());
        }

        let players: Vec<String> = conn
            .prepare(
                "SELECT r.subject_uuid, MAX(r.id) AS latest FROM (
                    SELECT provider_id, subject_uuid, id FROM extension_values
                    UNION ALL
                    SELECT provider_id, subject_uuid, id FROM extension_groups
                 ) r
                 JOIN extension_providers p ON p.id = r.provider_id
                 JOIN extension_plugins e ON e.id = p.plugin_id
                 WHERE e.server_uuid = ?1 AND p.scope = 'player' AND p.show_in_players_table = 1 AND p.disabled = 0
                 GROUP BY r.subject_uuid
                 ORDER BY latest DESC
                 LIMIT ?2",
            )?
            .query_map(params![self.server.to_string(), self.limit as i64], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        let mut table = HashMap::with_capacity(players.len());
        for key in players {
            let Ok(player) = key.parse::<PlayerUuid>() else {
                continue;
            };
            let mut values = subject_values(conn, &catalog, Scope::Player, &key)?;
            values.extend(subject_groups(conn, &catalog, &key)?);

            let mut tab = ExtensionTabData::new(ExtensionTabInformation::default_tab());
            tab.put_all(values.into_iter().map(|(_, value)| value).collect());
            table.insert(player, tab);
        }
        Ok(table)
    }
}

/// The extension catalog of a server.
pub struct ExtensionInformationQuery {
    pub server: ServerUuid,
}

impl Query for ExtensionInformationQuery {
    type Output = Vec<ExtensionCatalogEntry>;

    fn run(&self, conn: &Connection) -> Result<Self::Output, StoreError> {
        let mut statement = conn.prepare(
            "SELECT e.id, e.name, e.icon_name, e.icon_family, e.icon_color, e.last_updated,
                (SELECT COUNT(*) FROM extension_providers p WHERE p.plugin_id = e.id),
                (SELECT COUNT(*) FROM extension_providers p WHERE p.plugin_id = e.id AND p.disabled = 1),
                (SELECT COUNT(*) FROM extension_values v
                    JOIN extension_providers p ON p.id = v.provider_id WHERE p.plugin_id = e.id)
             FROM extension_plugins e WHERE e.server_uuid = ?1 ORDER BY e.name",
        )?;
        let entries: Vec<ExtensionCatalogEntry> = statement
            .query_map(params![self.server.to_string()], |row| {
                Ok(ExtensionCatalogEntry {
                    information: ExtensionInformation {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        icon: icon_at(row, 2)?,
                    },
                    last_updated: row.get(5)?,
                    providers: row.get::<_, i64>(6)? as usize,
                    disabled_providers: row.get::<_, i64>(7)? as usize,
                    stored_values: row.get::<_, i64>(8)? as usize,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(entries)
    }
}

// ============================================================================
// Catalog
// ============================================================================

struct ProviderRow {
    plugin_id: i64,
    tab_id: Option<i64>,
    scope: Scope,
    kind: ValueKind,
    description: ExtensionDescription,
    hidden: bool,
    show_in_players_table: bool,
    format: FormatType,
    player_name: bool,
    table_color: Color,
    table_columns: Option<String>,
}

/// Plugins, tabs and enabled providers of one server.
struct Catalog {
    plugins: Vec<ExtensionInformation>,
    tabs: HashMap<i64, ExtensionTabInformation>,
    providers: HashMap<i64, ProviderRow>,
}

impl Catalog {
    fn load(conn: &Connection, server: ServerUuid) -> Result<Self, StoreError> {
        let server = server.to_string();

        let plugins: Vec<ExtensionInformation> = conn
            .prepare(
                "SELECT id, name, icon_name, icon_family, icon_color FROM extension_plugins
                 WHERE server_uuid = ?1 ORDER BY name",
            )?
            .query_map(params![server], |row| {
                Ok(ExtensionInformation {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    icon: icon_at(row, 2)?,
                })
            })?
            .collect::<Result<_, _>>()?;

        let tabs: HashMap<i64, ExtensionTabInformation> = conn
            .prepare(
                "SELECT t.id, t.name, t.element_order, t.priority, t.icon_name, t.icon_family, t.icon_color
                 FROM extension_tabs t JOIN extension_plugins e ON e.id = t.plugin_id
                 WHERE e.server_uuid = ?1",
            )?
            .query_map(params![server], |row| {
                let element_order: String = row.get(2)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    ExtensionTabInformation {
                        name: row.get(1)?,
                        element_order: ElementOrder::parse_order(&element_order),
                        priority: row.get(3)?,
                        icon: icon_at(row, 4)?,
                    },
                ))
            })?
            .collect::<Result<_, _>>()?;

        let mut providers = HashMap::new();
        let mut statement = conn.prepare(
            "SELECT p.id, p.plugin_id, p.tab_id, p.scope, p.kind, p.name, p.text, p.description, p.priority,
                    p.icon_name, p.icon_family, p.icon_color, p.hidden, p.show_in_players_table,
                    p.format_type, p.is_player_name, p.table_color, p.table_columns
             FROM extension_providers p JOIN extension_plugins e ON e.id = p.plugin_id
             WHERE e.server_uuid = ?1 AND p.disabled = 0",
        )?;
        let mut rows = statement.query(params![server])?;
        while let Some(row) = rows.next()? {
            let kind: String = row.get(4)?;
            let Some(kind) = ValueKind::from_name(&kind) else {
                continue;
            };
            let scope: String = row.get(3)?;
            let scope = if scope == Scope::Server.as_str() {
                Scope::Server
            } else {
                Scope::Player
            };
            let format: String = row.get(14)?;
            let table_color: String = row.get(16)?;
            providers.insert(
                row.get::<_, i64>(0)?,
                ProviderRow {
                    plugin_id: row.get(1)?,
                    tab_id: row.get(2)?,
                    scope,
                    kind,
                    description: ExtensionDescription {
                        name: row.get(5)?,
                        text: row.get(6)?,
                        description: row.get(7)?,
                        priority: row.get(8)?,
                        icon: icon_at(row, 9)?,
                    },
                    hidden: row.get(12)?,
                    show_in_players_table: row.get(13)?,
                    format: FormatType::from_name(&format),
                    player_name: row.get(15)?,
                    table_color: Color::from_name(&table_color),
                    table_columns: row.get(17)?,
                },
            );
        }

        Ok(Self {
            plugins,
            tabs,
            providers,
        })
    }

    /// Places values into their plugin and tab.
    ///
    /// Plugins without values are left out. Tabs sort by priority, then by the
    /// order they were first stored in, with the default tab first among equals.
    fn assemble(&self, values: Vec<(i64, DataValue)>) -> Vec<ExtensionData> {
        let mut per_plugin: HashMap<i64, BTreeMap<Option<i64>, Vec<DataValue>>> = HashMap::new();
        for (provider_id, value) in values {
            let Some(provider) = self.providers.get(&provider_id) else {
                continue;
            };
            let tab = provider.tab_id.filter(|id| self.tabs.contains_key(id));
            per_plugin
                .entry(provider.plugin_id)
                .or_default()
                .entry(tab)
                .or_default()
                .push(value);
        }

        let mut extensions = Vec::new();
        for information in &self.plugins {
            let Some(tab_values) = per_plugin.remove(&information.id) else {
                continue;
            };
            let mut tabs: Vec<(i32, i64, ExtensionTabData)> = tab_values
                .into_iter()
                .map(|(tab_id, values)| {
                    let info = tab_id
                        .and_then(|id| self.tabs.get(&id))
                        .cloned()
                        .unwrap_or_else(ExtensionTabInformation::default_tab);
                    let mut tab = ExtensionTabData::new(info);
                    tab.put_all(values);
                    (tab.information.priority, tab_id.unwrap_or(-1), tab)
                })
                .collect();
            tabs.sort_by_key(|(priority, id, _)| (*priority, *id));

            extensions.push(ExtensionData {
                information: information.clone(),
                tabs: tabs.into_iter().map(|(_, _, tab)| tab).collect(),
            });
        }
        extensions
    }
}

fn icon_at(row: &Row<'_>, start: usize) -> rusqlite::Result<Icon> {
    let family: String = row.get(start + 1)?;
    let color: String = row.get(start + 2)?;
    Ok(Icon {
        name: row.get(start)?,
        family: Family::from_name(&family),
        color: Color::from_name(&color),
    })
}

// ============================================================================
// Values
// ============================================================================

fn subject_values(
    conn: &Connection,
    catalog: &Catalog,
    scope: Scope,
    subject: &str,
) -> Result<Vec<(i64, DataValue)>, StoreError> {
    let mut statement = conn.prepare(
        "SELECT provider_id, boolean_value, long_value, double_value, percentage_value, string_value
         FROM extension_values WHERE subject_uuid = ?1",
    )?;
    let mut rows = statement.query(params![subject])?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        let provider_id: i64 = row.get(0)?;
        let Some(provider) = catalog.providers.get(&provider_id) else {
            continue;
        };
        if provider.scope != scope {
            continue;
        }
        let description = provider.description.clone();
        let value = match provider.kind {
            ValueKind::Boolean if !provider.hidden => row
                .get::<_, Option<bool>>(1)?
                .map(|value| DataValue::Boolean(ExtensionBooleanData { description, value })),
            ValueKind::Number => row.get::<_, Option<i64>>(2)?.map(|value| {
                DataValue::Number(ExtensionNumberData {
                    description,
                    format: provider.format,
                    value,
                })
            }),
            ValueKind::Double => row
                .get::<_, Option<f64>>(3)?
                .map(|value| DataValue::Double(ExtensionDoubleData { description, value })),
            ValueKind::Percentage => row
                .get::<_, Option<f64>>(4)?
                .map(|value| DataValue::Percentage(ExtensionDoubleData { description, value })),
            ValueKind::String => row.get::<_, Option<String>>(5)?.map(|value| {
                DataValue::String(ExtensionStringData {
                    description,
                    value,
                    player_name: provider.player_name,
                })
            }),
            ValueKind::Boolean | ValueKind::Table | ValueKind::Group => None,
        };
        if let Some(value) = value {
            values.push((provider_id, value));
        }
    }
    Ok(values)
}

/// Group labels of a player, each provider's labels joined into one string.
fn subject_groups(conn: &Connection, catalog: &Catalog, subject: &str) -> Result<Vec<(i64, DataValue)>, StoreError> {
    let mut statement = conn.prepare(
        "SELECT provider_id, group_name FROM extension_groups
         WHERE subject_uuid = ?1 ORDER BY provider_id, group_name",
    )?;
    let mut labels: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    let mut rows = statement.query(params![subject])?;
    while let Some(row) = rows.next()? {
        let provider_id: i64 = row.get(0)?;
        if catalog.providers.contains_key(&provider_id) {
            labels.entry(provider_id).or_default().push(row.get(1)?);
        }
    }

    Ok(labels
        .into_iter()
        .filter_map(|(provider_id, labels)| {
            let provider = catalog.providers.get(&provider_id)?;
            Some((
                provider_id,
                DataValue::String(ExtensionStringData {
                    description: provider.description.clone(),
                    value: labels.join(", "),
                    player_name: false,
                }),
            ))
        })
        .collect())
}

fn subject_tables(
    conn: &Connection,
    catalog: &Catalog,
    scope: Scope,
    subject: &str,
) -> Result<Vec<(i64, DataValue)>, StoreError> {
    let mut statement = conn.prepare(
        "SELECT provider_id, col_1, col_2, col_3, col_4, col_5 FROM extension_table_rows
         WHERE subject_uuid = ?1 ORDER BY provider_id, row_index",
    )?;
    let mut rows_by_provider: HashMap<i64, Vec<[Option<String>; 5]>> = HashMap::new();
    let mut rows = statement.query(params![subject])?;
    while let Some(row) = rows.next()? {
        let cells = [row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?];
        rows_by_provider.entry(row.get(0)?).or_default().push(cells);
    }

    let mut tables = Vec::new();
    for (provider_id, provider) in &catalog.providers {
        if provider.kind != ValueKind::Table || provider.scope != scope {
            continue;
        }
        let Some(columns) = &provider.table_columns else {
            continue;
        };
        let rows = rows_by_provider.remove(provider_id).unwrap_or_default();
        if rows.is_empty() && scope == Scope::Player {
            continue;
        }
        let stored: Vec<StoredColumn> = serde_json::from_str(columns)?;
        let columns: Vec<TableColumn> = stored.into_iter().map(TableColumn::from).collect();
        let width = columns.len();
        tables.push((
            *provider_id,
            DataValue::Table(ExtensionTableData {
                provider_name: provider.description.name.clone(),
                text: provider.description.text.clone(),
                color: provider.table_color,
                rows: rows
                    .into_iter()
                    .map(|cells| cells.into_iter().take(width).map(Option::unwrap_or_default).collect())
                    .collect(),
                columns,
            }),
        ));
    }
    Ok(tables)
}

// ============================================================================
// Aggregates
// ============================================================================

/// Totals and averages over the player values of a server.
///
/// Numbers and doubles get `_total` and `_avg`, percentages `_avg`, and
/// visible booleans `_aggregate` holding the fraction of players with `true`.
/// Number totals are summed as floating point and saturate at the `i64` range.
fn aggregates(conn: &Connection, catalog: &Catalog, server: ServerUuid) -> Result<Vec<(i64, DataValue)>, StoreError> {
    let mut statement = conn.prepare(
        "SELECT v.provider_id, COUNT(v.boolean_value), SUM(v.boolean_value), TOTAL(v.long_value), AVG(v.long_value),
                SUM(v.double_value), AVG(v.double_value), AVG(v.percentage_value)
         FROM extension_values v
         JOIN extension_providers p ON p.id = v.provider_id
         JOIN extension_plugins e ON e.id = p.plugin_id
         WHERE e.server_uuid = ?1 AND p.scope = 'player' AND p.disabled = 0
         GROUP BY v.provider_id",
    )?;
    let mut rows = statement.query(params![server.to_string()])?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        let provider_id: i64 = row.get(0)?;
        let Some(provider) = catalog.providers.get(&provider_id) else {
            continue;
        };
        let derived = |suffix: &str, text: String| ExtensionDescription {
            name: format!("{}{}", provider.description.name, suffix),
            text,
            ..provider.description.clone()
        };
        let text = &provider.description.text;

        match provider.kind {
            ValueKind::Number => {
                if let Some(average) = row.get::<_, Option<f64>>(4)? {
                    let total: f64 = row.get(3)?;
                    values.push((
                        provider_id,
                        DataValue::Number(ExtensionNumberData {
                            description: derived("_total", format!("Total {text}")),
                            format: provider.format,
                            value: total as i64,
                        }),
                    ));
                    values.push((
                        provider_id,
                        DataValue::Number(ExtensionNumberData {
                            description: derived("_avg", format!("Average {text}")),
                            format: provider.format,
                            value: average.round() as i64,
                        }),
                    ));
                }
            }
            ValueKind::Double => {
                if let (Some(total), Some(average)) = (row.get::<_, Option<f64>>(5)?, row.get::<_, Option<f64>>(6)?) {
                    values.push((
                        provider_id,
                        DataValue::Double(ExtensionDoubleData {
                            description: derived("_total", format!("Total {text}")),
                            value: total,
                        }),
                    ));
                    values.push((
                        provider_id,
                        DataValue::Double(ExtensionDoubleData {
                            description: derived("_avg", format!("Average {text}")),
                            value: average,
                        }),
                    ));
                }
            }
            ValueKind::Percentage => {
                if let Some(average) = row.get::<_, Option<f64>>(7)? {
                    values.push((
                        provider_id,
                        DataValue::Percentage(ExtensionDoubleData {
                            description: derived("_avg", format!("Average {text}")),
                            value: average,
                        }),
                    ));
                }
            }
            ValueKind::Boolean if !provider.hidden => {
                let count: i64 = row.get(1)?;
                let true_count: Option<i64> = row.get(2)?;
                if count > 0 {
                    values.push((
                        provider_id,
                        DataValue::Percentage(ExtensionDoubleData {
                            description: derived("_aggregate", text.clone()),
                            value: true_count.unwrap_or(0) as f64 / count as f64,
                        }),
                    ));
                }
            }
            _ => {}
        }
    }
    Ok(values)
}

/// Number of players per group label, as a two column table.
fn group_counts(conn: &Connection, catalog: &Catalog, server: ServerUuid) -> Result<Vec<(i64, DataValue)>, StoreError> {
    let mut statement = conn.prepare(
        "SELECT g.provider_id, g.group_name, COUNT(DISTINCT g.subject_uuid)
         FROM extension_groups g
         JOIN extension_providers p ON p.id = g.provider_id
         JOIN extension_plugins e ON e.id = p.plugin_id
         WHERE e.server_uuid = ?1 AND p.disabled = 0
         GROUP BY g.provider_id, g.group_name
         ORDER BY g.provider_id, g.group_name",
    )?;
    let mut counts: BTreeMap<i64, Vec<Vec<String>>> = BTreeMap::new();
    let mut rows = statement.query(params![server.to_string()])?;
    while let Some(row) = rows.next()? {
        let provider_id: i64 = row.get(0)?;
        let label: String = row.get(1)?;
        let players: i64 = row.get(2)?;
        counts
            .entry(provider_id)
            .or_default()
            .push(vec![label, players.to_string()]);
    }

    Ok(counts
        .into_iter()
        .filter_map(|(provider_id, rows)| {
            let provider = catalog.providers.get(&provider_id)?;
            Some((
                provider_id,
                DataValue::Table(ExtensionTableData {
                    provider_name: provider.description.name.clone(),
                    text: provider.description.text.clone(),
                    color: Color::None,
                    columns: vec![
                        TableColumn {
                            name: provider.description.text.clone(),
                            icon: provider.description.icon.clone(),
                        },
                        TableColumn {
                            name: "Players".to_string(),
                            icon: Icon::called("users"),
                        },
                    ],
                    rows,
                }),
            ))
        })
        .collect())
}
