//! SQLite schema and migrations for the memory store.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Apply per-connection pragmas. Must run on every open, not only on first
/// initialization, because SQLite does not persist `foreign_keys`.
pub fn configure_connection(conn: &Connection) -> SqliteResult<()> {
    // WAL lets the review UI read while a mutation is in flight
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> SqliteResult<()> {
    configure_connection(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn).unwrap_or(0);

    if current_version < 1 {
        apply_v1_schema(conn)?;
    }

    Ok(())
}

/// Apply version 1 schema.
fn apply_v1_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS contents (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            title TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            disclosure TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS paths (
            uri TEXT PRIMARY KEY,
            domain TEXT NOT NULL,
            parent_uri TEXT,
            content_id TEXT NOT NULL,
            local_priority INTEGER,
            local_disclosure TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (content_id) REFERENCES contents(id)
        );

        CREATE TABLE IF NOT EXISTS review_sessions (
            session_id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshots (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            uri TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            operation_type TEXT NOT NULL,
            snapshot_data TEXT,
            snapshot_time TEXT NOT NULL,
            UNIQUE (session_id, resource_id),
            FOREIGN KEY (session_id) REFERENCES review_sessions(session_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_paths_parent ON paths(domain, parent_uri);
        CREATE INDEX IF NOT EXISTS idx_paths_content ON paths(content_id);
        CREATE INDEX IF NOT EXISTS idx_contents_updated ON contents(updated_at);
        CREATE INDEX IF NOT EXISTS idx_snapshots_session ON snapshots(session_id, snapshot_time);

        INSERT INTO schema_version (version) VALUES (1);",
    )
}

/// Get the current schema version.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// Check if the schema is initialized.
pub fn is_initialized(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='paths'",
        [],
        |row| row.get::<_, i32>(0),
    )
    .map(|count| count > 0)
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_schema() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        assert!(is_initialized(&conn));
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_idempotent_initialization() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let enabled: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);

        // A path may not reference a missing content record
        let result = conn.execute(
            "INSERT INTO paths (uri, domain, parent_uri, content_id, created_at)
             VALUES ('core://x', 'core', NULL, 'missing', 'now')",
            [],
        );
        assert!(result.is_err());
    }
}
