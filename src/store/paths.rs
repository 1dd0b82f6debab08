//! Path entries: the addressable names that point at content records.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;

use super::content::{row_to_record, RECORD_COLUMNS};
use super::{conversion_error, format_datetime, is_unique_violation, parse_datetime};
use crate::error::{Error, Result};
use crate::types::{ContentId, NodeState, PathEntry};
use crate::uri::MemoryUri;

const PATH_COLUMNS: &str =
    "p.uri, p.content_id, p.local_priority, p.local_disclosure, p.parent_uri, p.created_at";

fn uri_column(row: &Row, idx: usize) -> rusqlite::Result<MemoryUri> {
    let raw: String = row.get(idx)?;
    MemoryUri::parse(&raw).map_err(|e| conversion_error(idx, e))
}

fn row_to_path(row: &Row) -> rusqlite::Result<PathEntry> {
    let parent_uri = match row.get::<_, Option<String>>(4)? {
        Some(raw) => Some(MemoryUri::parse(&raw).map_err(|e| conversion_error(4, e))?),
        None => None,
    };
    Ok(PathEntry {
        uri: uri_column(row, 0)?,
        content_id: ContentId(row.get(1)?),
        local_priority: row.get(2)?,
        local_disclosure: row.get(3)?,
        parent_uri,
        created_at: parse_datetime(row.get::<_, String>(5)?),
    })
}

fn row_to_state(row: &Row) -> rusqlite::Result<NodeState> {
    Ok(NodeState {
        path: row_to_path(row)?,
        record: row_to_record(row, 6)?,
    })
}

fn state_query(filter: &str) -> String {
    format!(
        "SELECT {}, {} FROM paths p JOIN contents c ON c.id = p.content_id {}",
        PATH_COLUMNS, RECORD_COLUMNS, filter
    )
}

fn query_states(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<NodeState>> {
    let mut stmt = conn.prepare(sql)?;
    let states = stmt
        .query_map(params, row_to_state)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(states)
}

/// Insert a path. Fails with [`Error::DuplicateUri`] if the URI is taken; the
/// primary key makes this the atomic reserve-or-fail check.
pub fn insert_path(conn: &Connection, path: &PathEntry) -> Result<()> {
    let result = conn.execute(
        "INSERT INTO paths (uri, domain, parent_uri, content_id, local_priority,
                            local_disclosure, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            path.uri.to_string(),
            path.uri.domain(),
            path.parent_uri.as_ref().map(|p| p.to_string()),
            path.content_id.as_str(),
            path.local_priority,
            path.local_disclosure,
            format_datetime(&path.created_at),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(Error::duplicate_uri(path.uri.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Get a path entry by URI.
pub fn get_path(conn: &Connection, uri: &MemoryUri) -> Result<Option<PathEntry>> {
    let sql = format!("SELECT {} FROM paths p WHERE p.uri = ?1", PATH_COLUMNS);
    Ok(conn
        .query_row(&sql, params![uri.to_string()], row_to_path)
        .optional()?)
}

/// Whether a path exists at `uri`.
pub fn path_exists(conn: &Connection, uri: &MemoryUri) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM paths WHERE uri = ?1",
        params![uri.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Get a path joined with its record.
///
/// A path whose record is missing violates the store's reference invariant
/// and is reported as [`Error::Integrity`].
pub fn get_state(conn: &Connection, uri: &MemoryUri) -> Result<Option<NodeState>> {
    let sql = state_query("WHERE p.uri = ?1");
    let state = conn
        .query_row(&sql, params![uri.to_string()], row_to_state)
        .optional()?;
    if state.is_none() && path_exists(conn, uri)? {
        return Err(Error::Integrity(format!(
            "path {} references a missing content record",
            uri
        )));
    }
    Ok(state)
}

/// Children of `parent` (a path or a domain root), unordered.
pub fn child_states(conn: &Connection, parent: &MemoryUri) -> Result<Vec<NodeState>> {
    if parent.is_root() {
        let sql = state_query("WHERE p.domain = ?1 AND p.parent_uri IS NULL");
        query_states(conn, &sql, params![parent.domain()])
    } else {
        let sql = state_query("WHERE p.parent_uri = ?1");
        query_states(conn, &sql, params![parent.to_string()])
    }
}

/// Segment names of the children of `parent`.
pub fn child_names(conn: &Connection, parent: &MemoryUri) -> Result<Vec<String>> {
    let uris: Vec<String> = if parent.is_root() {
        let mut stmt =
            conn.prepare("SELECT uri FROM paths WHERE domain = ?1 AND parent_uri IS NULL")?;
        let rows = stmt.query_map(params![parent.domain()], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    } else {
        let mut stmt = conn.prepare("SELECT uri FROM paths WHERE parent_uri = ?1")?;
        let rows = stmt.query_map(params![parent.to_string()], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    Ok(uris
        .iter()
        .filter_map(|u| u.rsplit('/').next().map(str::to_string))
        .collect())
}

/// The path at `uri` and all of its descendants, deepest first.
pub fn subtree_states(conn: &Connection, uri: &MemoryUri) -> Result<Vec<NodeState>> {
    let prefix = format!("{}/", uri);
    let sql = state_query(
        "WHERE p.uri = ?1 OR substr(p.uri, 1, length(?2)) = ?2
         ORDER BY length(p.uri) DESC, p.uri",
    );
    query_states(conn, &sql, params![uri.to_string(), prefix])
}

/// All URIs pointing at a content record.
pub fn uris_for_content(conn: &Connection, id: &ContentId) -> Result<Vec<MemoryUri>> {
    let mut stmt = conn.prepare("SELECT uri FROM paths WHERE content_id = ?1 ORDER BY uri")?;
    let uris = stmt
        .query_map(params![id.as_str()], |row| uri_column(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(uris)
}

/// Every path with its record, ordered by URI, optionally within one domain.
pub fn all_states(conn: &Connection, domain: Option<&str>) -> Result<Vec<NodeState>> {
    match domain {
        Some(domain) => {
            let sql = state_query("WHERE p.domain = ?1 ORDER BY p.uri");
            query_states(conn, &sql, params![domain])
        }
        None => {
            let sql = state_query("ORDER BY p.uri");
            query_states(conn, &sql, [])
        }
    }
}

/// Most recently updated records, one path each (the lexically first alias).
pub fn recent_states(conn: &Connection, limit: usize) -> Result<Vec<NodeState>> {
    let sql = state_query("ORDER BY c.updated_at DESC, p.uri");
    let mut seen = HashSet::new();
    let states = query_states(conn, &sql, [])?
        .into_iter()
        .filter(|s| seen.insert(s.record.content_id.clone()))
        .take(limit)
        .collect();
    Ok(states)
}

/// Replace the per-path overrides.
pub fn update_overrides(
    conn: &Connection,
    uri: &MemoryUri,
    local_priority: Option<u32>,
    local_disclosure: Option<&str>,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE paths SET local_priority = ?2, local_disclosure = ?3 WHERE uri = ?1",
        params![uri.to_string(), local_priority, local_disclosure],
    )?;
    if rows == 0 {
        return Err(Error::not_found(uri.to_string()));
    }
    Ok(())
}

/// Overwrite an existing path with a captured entry.
pub fn restore_path(conn: &Connection, path: &PathEntry) -> Result<()> {
    let rows = conn.execute(
        "UPDATE paths SET content_id = ?2, local_priority = ?3, local_disclosure = ?4,
                          created_at = ?5
         WHERE uri = ?1",
        params![
            path.uri.to_string(),
            path.content_id.as_str(),
            path.local_priority,
            path.local_disclosure,
            format_datetime(&path.created_at),
        ],
    )?;
    if rows == 0 {
        return Err(Error::not_found(path.uri.to_string()));
    }
    Ok(())
}

/// Delete a single path row. Returns whether it existed.
pub fn delete_path(conn: &Connection, uri: &MemoryUri) -> Result<bool> {
    let rows = conn.execute("DELETE FROM paths WHERE uri = ?1", params![uri.to_string()])?;
    Ok(rows > 0)
}

/// Paths whose record is missing.
pub fn dangling_paths(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT p.uri FROM paths p
         WHERE NOT EXISTS (SELECT 1 FROM contents c WHERE c.id = p.content_id)
         ORDER BY p.uri",
    )?;
    let uris = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(uris)
}

/// Non-root paths whose parent path is missing.
pub fn detached_paths(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT p.uri FROM paths p
         WHERE p.parent_uri IS NOT NULL
           AND NOT EXISTS (SELECT 1 FROM paths q WHERE q.uri = p.parent_uri)
         ORDER BY p.uri",
    )?;
    let uris = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(uris)
}
