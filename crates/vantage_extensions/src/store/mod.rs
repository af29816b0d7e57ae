//! # Result Store
//!
//! SQLite backed persistence of the extension catalog and gathered values.
//!
//! All access goes through one connection guarded by a mutex. Writes are
//! expressed as [`Transaction`]s and run inside a single SQLite transaction,
//! reads are expressed as [`Query`]s. Uniqueness of `(provider, subject)` rows is
//! additionally enforced by the schema.

pub mod data;
pub mod queries;
pub mod transactions;
pub mod values;

mod schema;

use crate::error::StoreError;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;
use vantage_extension_api::{PlayerUuid, Scope, ServerUuid};

/// A unit of writes executed atomically.
pub trait Transaction: Send + Sync {
    fn execute(&self, tx: &rusqlite::Transaction<'_>) -> Result<(), StoreError>;
}

/// A read against the store.
pub trait Query {
    type Output;

    fn run(&self, conn: &Connection) -> Result<Self::Output, StoreError>;
}

/// The single-writer database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        debug!("Opened extension database at {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs the transaction, committing only when it succeeds.
    pub fn execute_transaction<T: Transaction + ?Sized>(&self, transaction: &T) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        transaction.execute(&tx)?;
        tx.commit()?;
        Ok(())
    }

    pub fn query<Q: Query + ?Sized>(&self, query: &Q) -> Result<Q::Output, StoreError> {
        let conn = self.conn.lock();
        query.run(&conn)
    }
}

/// The entity a stored value is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Server(ServerUuid),
    Player(PlayerUuid),
}

impl Subject {
    pub fn scope(&self) -> Scope {
        match self {
            Subject::Server(_) => Scope::Server,
            Subject::Player(_) => Scope::Player,
        }
    }

    /// Value of the `subject_uuid` column.
    pub fn key(&self) -> String {
        match self {
            Subject::Server(server) => server.to_string(),
            Subject::Player(player) => player.to_string(),
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Server(server) => write!(f, "server {server}"),
            Subject::Player(player) => write!(f, "player {player}"),
        }
    }
}

pub(crate) fn plugin_id(conn: &Connection, server: ServerUuid, plugin: &str) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT id FROM extension_plugins WHERE name = ?1 AND server_uuid = ?2",
        params![plugin, server.to_string()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StoreError::UnknownPlugin(plugin.to_string()))
}

pub(crate) fn provider_id(
    conn: &Connection,
    server: ServerUuid,
    plugin: &str,
    scope: Scope,
    provider: &str,
) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT p.id FROM extension_providers p
         JOIN extension_plugins e ON e.id = p.plugin_id
         WHERE e.name = ?1 AND e.server_uuid = ?2 AND p.scope = ?3 AND p.name = ?4",
        params![plugin, server.to_string(), scope.as_str(), provider],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StoreError::UnknownProvider {
        plugin: plugin.to_string(),
        provider: provider.to_string(),
    })
}
