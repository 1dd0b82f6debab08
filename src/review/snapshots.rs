//! Snapshot persistence.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::{OperationType, SessionId, SessionInfo, Snapshot};
use crate::error::{Error, Result};
use crate::store::{conversion_error, format_datetime, parse_datetime};
use crate::uri::MemoryUri;

const SNAPSHOT_COLUMNS: &str = "session_id, resource_id, uri, resource_type, operation_type,
     snapshot_data, snapshot_time";

fn row_to_snapshot(row: &Row) -> rusqlite::Result<Snapshot> {
    let uri: String = row.get(2)?;
    let operation: String = row.get(4)?;
    let data: Option<String> = row.get(5)?;
    Ok(Snapshot {
        session_id: SessionId(row.get(0)?),
        resource_id: row.get(1)?,
        uri: MemoryUri::parse(&uri).map_err(|e| conversion_error(2, e))?,
        resource_type: row.get(3)?,
        operation_type: OperationType::parse(&operation).map_err(|e| conversion_error(4, e))?,
        snapshot_data: data
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| conversion_error(5, e))?,
        snapshot_time: parse_datetime(row.get::<_, String>(6)?),
    })
}

/// Register a session if it is not known yet.
pub fn ensure_session(conn: &Connection, session_id: &SessionId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO review_sessions (session_id, created_at) VALUES (?1, ?2)",
        params![session_id.as_str(), format_datetime(&chrono::Utc::now())],
    )?;
    Ok(())
}

pub fn session_exists(conn: &Connection, session_id: &SessionId) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM review_sessions WHERE session_id = ?1",
        params![session_id.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Store a new snapshot. The session must exist.
pub fn insert_snapshot(conn: &Connection, snapshot: &Snapshot) -> Result<()> {
    let data = snapshot
        .snapshot_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO snapshots (session_id, resource_id, uri, resource_type, operation_type,
                                snapshot_data, snapshot_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            snapshot.session_id.as_str(),
            snapshot.resource_id,
            snapshot.uri.to_string(),
            snapshot.resource_type,
            snapshot.operation_type.as_str(),
            data,
            format_datetime(&snapshot.snapshot_time),
        ],
    )?;
    Ok(())
}

pub fn get_snapshot(
    conn: &Connection,
    session_id: &SessionId,
    resource_id: &str,
) -> Result<Option<Snapshot>> {
    let sql = format!(
        "SELECT {} FROM snapshots WHERE session_id = ?1 AND resource_id = ?2",
        SNAPSHOT_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![session_id.as_str(), resource_id], row_to_snapshot)
        .optional()?)
}

/// Change the operation type of a pending snapshot. The captured data is
/// never touched.
pub fn set_operation_type(
    conn: &Connection,
    session_id: &SessionId,
    resource_id: &str,
    operation_type: OperationType,
) -> Result<()> {
    conn.execute(
        "UPDATE snapshots SET operation_type = ?3 WHERE session_id = ?1 AND resource_id = ?2",
        params![session_id.as_str(), resource_id, operation_type.as_str()],
    )?;
    Ok(())
}

/// Snapshots of a session in capture order.
pub fn list_snapshots(conn: &Connection, session_id: &SessionId) -> Result<Vec<Snapshot>> {
    let sql = format!(
        "SELECT {} FROM snapshots WHERE session_id = ?1 ORDER BY snapshot_time, seq",
        SNAPSHOT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let snapshots = stmt
        .query_map(params![session_id.as_str()], row_to_snapshot)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(snapshots)
}

/// Sessions with their pending counts, oldest first.
pub fn list_sessions(conn: &Connection) -> Result<Vec<SessionInfo>> {
    let mut stmt = conn.prepare(
        "SELECT s.session_id, s.created_at,
                (SELECT COUNT(*) FROM snapshots n WHERE n.session_id = s.session_id)
         FROM review_sessions s
         ORDER BY s.created_at, s.session_id",
    )?;
    let sessions = stmt
        .query_map([], |row| {
            Ok(SessionInfo {
                session_id: SessionId(row.get(0)?),
                created_at: parse_datetime(row.get::<_, String>(1)?),
                pending_count: row.get::<_, i64>(2)? as usize,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(sessions)
}

/// Drop one snapshot, and its session once nothing is pending.
pub fn delete_snapshot(
    conn: &Connection,
    session_id: &SessionId,
    resource_id: &str,
) -> Result<()> {
    let rows = conn.execute(
        "DELETE FROM snapshots WHERE session_id = ?1 AND resource_id = ?2",
        params![session_id.as_str(), resource_id],
    )?;
    if rows == 0 {
        return Err(snapshot_not_found(session_id, resource_id));
    }
    conn.execute(
        "DELETE FROM review_sessions
         WHERE session_id = ?1
           AND NOT EXISTS (SELECT 1 FROM snapshots WHERE session_id = ?1)",
        params![session_id.as_str()],
    )?;
    Ok(())
}

/// Drop a session and all its snapshots. Returns how many were pending.
pub fn delete_session(conn: &Connection, session_id: &SessionId) -> Result<usize> {
    let pending: i64 = conn.query_row(
        "SELECT COUNT(*) FROM snapshots WHERE session_id = ?1",
        params![session_id.as_str()],
        |row| row.get(0),
    )?;
    conn.execute(
        "DELETE FROM review_sessions WHERE session_id = ?1",
        params![session_id.as_str()],
    )?;
    Ok(pending as usize)
}

pub(crate) fn snapshot_not_found(session_id: &SessionId, resource_id: &str) -> Error {
    Error::not_found(format!(
        "snapshot for '{}' in session '{}'",
        resource_id, session_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{ContentRecord, NodeState, PathEntry};

    fn snapshot(session: &SessionId, uri: &str, data: Option<NodeState>) -> Snapshot {
        let op = if data.is_some() {
            OperationType::ModifyContent
        } else {
            OperationType::Create
        };
        Snapshot::new(session.clone(), MemoryUri::parse(uri).unwrap(), op, data)
    }

    fn state(uri: &str) -> NodeState {
        let record = ContentRecord::new("before", "a", 1);
        let path = PathEntry::new(MemoryUri::parse(uri).unwrap(), record.content_id.clone());
        NodeState { path, record }
    }

    #[test]
    fn test_snapshot_roundtrip_and_uniqueness() {
        let store = SqliteStore::in_memory().unwrap();
        let session = SessionId::from("s1");
        store
            .with_tx(|tx| {
                ensure_session(tx, &session)?;
                let stored = snapshot(&session, "core://a", Some(state("core://a")));
                insert_snapshot(tx, &stored)?;
                assert_eq!(get_snapshot(tx, &session, "core://a")?, Some(stored.clone()));

                // one snapshot per (session, resource)
                assert!(insert_snapshot(tx, &stored).is_err());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_session_removed_when_last_snapshot_goes() {
        let store = SqliteStore::in_memory().unwrap();
        let session = SessionId::from("s1");
        store
            .with_tx(|tx| {
                ensure_session(tx, &session)?;
                insert_snapshot(tx, &snapshot(&session, "core://a", None))?;
                insert_snapshot(tx, &snapshot(&session, "core://b", None))?;
                assert_eq!(list_sessions(tx)?[0].pending_count, 2);

                delete_snapshot(tx, &session, "core://a")?;
                assert!(session_exists(tx, &session)?);
                delete_snapshot(tx, &session, "core://b")?;
                assert!(!session_exists(tx, &session)?);

                let err = delete_snapshot(tx, &session, "core://b").unwrap_err();
                assert!(matches!(err, Error::NotFound(_)));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_list_in_capture_order() {
        let store = SqliteStore::in_memory().unwrap();
        let session = SessionId::from("s1");
        store
            .with_tx(|tx| {
                ensure_session(tx, &session)?;
                for uri in ["core://z", "core://a", "core://m"] {
                    insert_snapshot(tx, &snapshot(&session, uri, None))?;
                }
                let order: Vec<String> = list_snapshots(tx, &session)?
                    .into_iter()
                    .map(|s| s.resource_id)
                    .collect();
                assert_eq!(order, vec!["core://z", "core://a", "core://m"]);

                assert_eq!(delete_session(tx, &session)?, 3);
                assert!(list_snapshots(tx, &session)?.is_empty());
                Ok(())
            })
            .unwrap();
    }
}
