//! SQLite-backed content store and path resolver.
//!
//! The store owns a single connection behind a mutex. Every public operation
//! of the crate runs inside [`SqliteStore::with_tx`], which makes the mutex
//! the single-writer boundary and the SQLite transaction the atomicity
//! boundary: snapshot capture, mutation and garbage collection commit
//! together or not at all.
//!
//! The submodules hold plain functions over a `&Connection` so that callers
//! can compose them inside one transaction.

pub mod content;
pub mod paths;
mod schema;

pub use schema::{get_schema_version, initialize_schema, is_initialized, SCHEMA_VERSION};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::{Error, Result};

/// Shared handle to the SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!(
                    "failed to create database directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path)?;
        if is_initialized(&conn) {
            schema::configure_connection(&conn)?;
        } else {
            initialize_schema(&conn)?;
        }
        debug!(path = %path.display(), "opened memory store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection without opening a transaction.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))?;
        f(&conn)
    }

    /// Run `f` inside an immediate transaction; commit on `Ok`, roll back on
    /// `Err`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Timestamp format used for every stored time. Fixed width, so string order
/// equals time order.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Wrap a conversion failure so it can surface from a row-mapping closure.
pub(crate) fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

/// Whether a SQLite error is a primary-key/unique constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}
