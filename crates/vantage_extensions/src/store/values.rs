//! Gathered values and how each kind is written.

use super::Subject;
use crate::error::StoreError;
use rusqlite::{params, Connection, ToSql};
use serde::{Deserialize, Serialize};
use vantage_extension_api::{truncate, Icon, Table, TableColumn, ValueKind};

/// Longest string value kept.
pub const MAX_STRING_LENGTH: usize = 50;
/// Longest table cell kept.
pub const MAX_CELL_LENGTH: usize = 250;

/// A value returned by a provider, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub enum GatheredValue {
    Boolean(bool),
    Number(i64),
    Double(f64),
    Percentage(f64),
    String(String),
    Table(Table),
    Group(Vec<String>),
}

impl GatheredValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            GatheredValue::Boolean(_) => ValueKind::Boolean,
            GatheredValue::Number(_) => ValueKind::Number,
            GatheredValue::Double(_) => ValueKind::Double,
            GatheredValue::Percentage(_) => ValueKind::Percentage,
            GatheredValue::String(_) => ValueKind::String,
            GatheredValue::Table(_) => ValueKind::Table,
            GatheredValue::Group(_) => ValueKind::Group,
        }
    }

    /// Writes the value for the provider and subject, replacing what was there.
    pub fn store(&self, conn: &Connection, provider_id: i64, subject: &Subject) -> Result<(), StoreError> {
        let subject = subject.key();
        match self {
            GatheredValue::Boolean(value) => upsert(conn, "boolean_value", provider_id, &subject, value),
            GatheredValue::Number(value) => upsert(conn, "long_value", provider_id, &subject, value),
            GatheredValue::Double(value) => upsert(conn, "double_value", provider_id, &subject, value),
            GatheredValue::Percentage(value) => {
                upsert(conn, "percentage_value", provider_id, &subject, value)
            }
            GatheredValue::String(value) => {
                let value = truncate(value, MAX_STRING_LENGTH);
                upsert(conn, "string_value", provider_id, &subject, &value)
            }
            GatheredValue::Table(table) => replace_table(conn, provider_id, &subject, table),
            GatheredValue::Group(labels) => replace_groups(conn, provider_id, &subject, labels),
        }
    }
}

/// Update by `(provider, subject)`, insert when nothing was updated.
fn upsert<V: ToSql>(
    conn: &Connection,
    column: &'static str,
    provider_id: i64,
    subject: &str,
    value: V,
) -> Result<(), StoreError> {
    let updated = conn.execute(
        &format!("UPDATE extension_values SET {column} = ?1 WHERE provider_id = ?2 AND subject_uuid = ?3"),
        params![value, provider_id, subject],
    )?;
    if updated == 0 {
        conn.execute(
            &format!("INSERT INTO extension_values (provider_id, subject_uuid, {column}) VALUES (?1, ?2, ?3)"),
            params![provider_id, subject, value],
        )?;
    }
    Ok(())
}

fn replace_groups(conn: &Connection, provider_id: i64, subject: &str, labels: &[String]) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM extension_groups WHERE provider_id = ?1 AND subject_uuid = ?2",
        params![provider_id, subject],
    )?;
    let mut insert = conn.prepare(
        "INSERT OR IGNORE INTO extension_groups (provider_id, subject_uuid, group_name) VALUES (?1, ?2, ?3)",
    )?;
    for label in labels {
        insert.execute(params![provider_id, subject, truncate(label, MAX_STRING_LENGTH)])?;
    }
    Ok(())
}

/// Column metadata kept on the provider row, as the columns come with each result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredColumn {
    pub name: String,
    pub icon: Icon,
}

impl From<&TableColumn> for StoredColumn {
    fn from(column: &TableColumn) -> Self {
        Self {
            name: truncate(&column.name, MAX_STRING_LENGTH),
            icon: column.icon.clone(),
        }
    }
}

impl From<StoredColumn> for TableColumn {
    fn from(column: StoredColumn) -> Self {
        TableColumn {
            name: column.name,
            icon: column.icon,
        }
    }
}

fn replace_table(conn: &Connection, provider_id: i64, subject: &str, table: &Table) -> Result<(), StoreError> {
    let columns: Vec<StoredColumn> = table.columns().iter().map(StoredColumn::from).collect();
    conn.execute(
        "UPDATE extension_providers SET table_columns = ?1 WHERE id = ?2",
        params![serde_json::to_string(&columns)?, provider_id],
    )?;
    conn.execute(
        "DELETE FROM extension_table_rows WHERE provider_id = ?1 AND subject_uuid = ?2",
        params![provider_id, subject],
    )?;

    let mut insert = conn.prepare(
        "INSERT INTO extension_table_rows (provider_id, subject_uuid, row_index, col_1, col_2, col_3, col_4, col_5)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (index, row) in table.rows().iter().enumerate() {
        let cell = |column: usize| row.get(column).map(|value| truncate(value, MAX_CELL_LENGTH));
        insert.execute(params![
            provider_id,
            subject,
            index as i64,
            cell(0),
            cell(1),
            cell(2),
            cell(3),
            cell(4),
        ])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_extension_api::PlayerUuid;

    fn connection_with_provider() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(crate::store::schema::SCHEMA).unwrap();
        conn.execute_batch(
            "INSERT INTO extension_plugins (id, name, server_uuid, last_updated, icon_name, icon_family, icon_color)
             VALUES (1, 'Test', 'server', 0, 'circle', 'SOLID', 'NONE');
             INSERT INTO extension_providers (id, plugin_id, name, scope, kind, text, icon_name, icon_family, icon_color)
             VALUES (1, 1, 'value', 'player', 'string', 'Value', 'circle', 'SOLID', 'NONE');",
        )
        .unwrap();
        conn
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_repeated_upsert_keeps_one_row() {
        let conn = connection_with_provider();
        let subject = Subject::Player(PlayerUuid::new());
        for _ in 0..5 {
            GatheredValue::Number(7).store(&conn, 1, &subject).unwrap();
        }
        GatheredValue::Number(8).store(&conn, 1, &subject).unwrap();

        assert_eq!(count(&conn, "extension_values"), 1);
        let stored: i64 = conn
            .query_row("SELECT long_value FROM extension_values", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, 8);
    }

    #[test]
    fn test_strings_are_truncated() {
        let conn = connection_with_provider();
        let subject = Subject::Player(PlayerUuid::new());
        GatheredValue::String("x".repeat(80)).store(&conn, 1, &subject).unwrap();

        let stored: String = conn
            .query_row("SELECT string_value FROM extension_values", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored.len(), MAX_STRING_LENGTH);
    }

    #[test]
    fn test_groups_are_replaced_not_merged() {
        let conn = connection_with_provider();
        let subject = Subject::Player(PlayerUuid::new());
        GatheredValue::Group(vec!["a".into(), "b".into(), "b".into()])
            .store(&conn, 1, &subject)
            .unwrap();
        assert_eq!(count(&conn, "extension_groups"), 2);

        GatheredValue::Group(vec!["c".into()]).store(&conn, 1, &subject).unwrap();
        let labels: Vec<String> = conn
            .prepare("SELECT group_name FROM extension_groups")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(labels, vec!["c".to_string()]);
    }

    #[test]
    fn test_table_rows_are_replaced() {
        let conn = connection_with_provider();
        let subject = Subject::Player(PlayerUuid::new());
        let table = Table::builder()
            .column_one("name", None)
            .add_row(&[&"first"])
            .add_row(&[&"second"])
            .build();
        let value = GatheredValue::Table(table);
        value.store(&conn, 1, &subject).unwrap();
        value.store(&conn, 1, &subject).unwrap();

        assert_eq!(count(&conn, "extension_table_rows"), 2);
        let columns: String = conn
            .query_row("SELECT table_columns FROM extension_providers WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        let columns: Vec<StoredColumn> = serde_json::from_str(&columns).unwrap();
        assert_eq!(columns[0].name, "name");
    }
}
