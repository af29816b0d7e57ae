//! Table definitions.
//!
//! Player values are scoped to a server through their provider, which belongs
//! to a plugin row of that server.

pub(crate) const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS extension_plugins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    server_uuid TEXT NOT NULL,
    last_updated INTEGER NOT NULL,
    icon_name TEXT NOT NULL,
    icon_family TEXT NOT NULL,
    icon_color TEXT NOT NULL,
    UNIQUE(name, server_uuid)
);

CREATE TABLE IF NOT EXISTS extension_tabs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plugin_id INTEGER NOT NULL REFERENCES extension_plugins(id),
    name TEXT NOT NULL,
    element_order TEXT NOT NULL,
    priority INTEGER NOT NULL,
    icon_name TEXT NOT NULL,
    icon_family TEXT NOT NULL,
    icon_color TEXT NOT NULL,
    UNIQUE(plugin_id, name)
);

CREATE TABLE IF NOT EXISTS extension_providers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plugin_id INTEGER NOT NULL REFERENCES extension_plugins(id),
    name TEXT NOT NULL,
    scope TEXT NOT NULL,
    kind TEXT NOT NULL,
    text TEXT NOT NULL,
    description TEXT,
    priority INTEGER NOT NULL DEFAULT 0,
    icon_name TEXT NOT NULL,
    icon_family TEXT NOT NULL,
    icon_color TEXT NOT NULL,
    tab_id INTEGER REFERENCES extension_tabs(id),
    condition_name TEXT,
    provided_condition TEXT,
    hidden INTEGER NOT NULL DEFAULT 0,
    show_in_players_table INTEGER NOT NULL DEFAULT 0,
    format_type TEXT NOT NULL DEFAULT 'NONE',
    is_player_name INTEGER NOT NULL DEFAULT 0,
    table_color TEXT NOT NULL DEFAULT 'NONE',
    table_columns TEXT,
    disabled INTEGER NOT NULL DEFAULT 0,
    UNIQUE(plugin_id, scope, name)
);

CREATE TABLE IF NOT EXISTS extension_values (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider_id INTEGER NOT NULL REFERENCES extension_providers(id),
    subject_uuid TEXT NOT NULL,
    boolean_value INTEGER,
    long_value INTEGER,
    double_value REAL,
    percentage_value REAL,
    string_value TEXT,
    UNIQUE(provider_id, subject_uuid)
);

CREATE TABLE IF NOT EXISTS extension_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider_id INTEGER NOT NULL REFERENCES extension_providers(id),
    subject_uuid TEXT NOT NULL,
    group_name TEXT NOT NULL,
    UNIQUE(provider_id, subject_uuid, group_name)
);

CREATE TABLE IF NOT EXISTS extension_table_rows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider_id INTEGER NOT NULL REFERENCES extension_providers(id),
    subject_uuid TEXT NOT NULL,
    row_index INTEGER NOT NULL,
    col_1 TEXT,
    col_2 TEXT,
    col_3 TEXT,
    col_4 TEXT,
    col_5 TEXT,
    UNIQUE(provider_id, subject_uuid, row_index)
);

CREATE INDEX IF NOT EXISTS extension_values_subject ON extension_values(subject_uuid);
CREATE INDEX IF NOT EXISTS extension_groups_subject ON extension_groups(provider_id, subject_uuid);
";
