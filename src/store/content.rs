//! Content records: the text blobs and default metadata shared by paths.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_datetime, parse_datetime};
use crate::error::{Error, Result};
use crate::types::{ContentId, ContentRecord};

pub(crate) const RECORD_COLUMNS: &str =
    "c.id, c.content, c.title, c.priority, c.disclosure, c.created_at, c.updated_at";

/// Map a row selected with [`RECORD_COLUMNS`] starting at `offset`.
pub(crate) fn row_to_record(row: &Row, offset: usize) -> rusqlite::Result<ContentRecord> {
    Ok(ContentRecord {
        content_id: ContentId(row.get(offset)?),
        content: row.get(offset + 1)?,
        title: row.get(offset + 2)?,
        priority: row.get(offset + 3)?,
        disclosure: row.get(offset + 4)?,
        created_at: parse_datetime(row.get::<_, String>(offset + 5)?),
        updated_at: parse_datetime(row.get::<_, String>(offset + 6)?),
    })
}

/// Insert a new record.
pub fn insert_record(conn: &Connection, record: &ContentRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO contents (id, content, title, priority, disclosure, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.content_id.as_str(),
            record.content,
            record.title,
            record.priority,
            record.disclosure,
            format_datetime(&record.created_at),
            format_datetime(&record.updated_at),
        ],
    )?;
    Ok(())
}

/// Get a record by ID.
pub fn get_record(conn: &Connection, id: &ContentId) -> Result<Option<ContentRecord>> {
    let sql = format!("SELECT {} FROM contents c WHERE c.id = ?1", RECORD_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id.as_str()], |row| row_to_record(row, 0))
        .optional()?)
}

/// Update the mutable fields of an existing record.
pub fn update_record(conn: &Connection, record: &ContentRecord) -> Result<()> {
    let rows = conn.execute(
        "UPDATE contents SET content = ?2, title = ?3, priority = ?4, disclosure = ?5,
                updated_at = ?6
         WHERE id = ?1",
        params![
            record.content_id.as_str(),
            record.content,
            record.title,
            record.priority,
            record.disclosure,
            format_datetime(&record.updated_at),
        ],
    )?;
    if rows == 0 {
        return Err(Error::not_found(format!("content record {}", record.content_id)));
    }
    Ok(())
}

/// Write a record exactly as given, creating it if it was collected.
pub fn restore_record(conn: &Connection, record: &ContentRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO contents (id, content, title, priority, disclosure, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            content = excluded.content,
            title = excluded.title,
            priority = excluded.priority,
            disclosure = excluded.disclosure,
            updated_at = excluded.updated_at",
        params![
            record.content_id.as_str(),
            record.content,
            record.title,
            record.priority,
            record.disclosure,
            format_datetime(&record.created_at),
            format_datetime(&record.updated_at),
        ],
    )?;
    Ok(())
}

/// Number of paths referencing a record.
pub fn reference_count(conn: &Connection, id: &ContentId) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM paths WHERE content_id = ?1",
        params![id.as_str()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Whether a record exists, referenced or not.
pub fn record_exists(conn: &Connection, id: &ContentId) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM contents WHERE id = ?1",
        params![id.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Hard-delete the record if no path references it any more.
///
/// Must run in the same transaction as the path deletion that dropped the
/// last reference. Returns whether the record was collected.
pub fn collect_if_unreferenced(conn: &Connection, id: &ContentId) -> Result<bool> {
    if reference_count(conn, id)? > 0 {
        return Ok(false);
    }
    let rows = conn.execute("DELETE FROM contents WHERE id = ?1", params![id.as_str()])?;
    if rows == 0 {
        return Err(Error::Integrity(format!(
            "content record {} vanished while still being collected",
            id
        )));
    }
    Ok(true)
}

/// Records that no path references.
pub fn orphaned_records(conn: &Connection) -> Result<Vec<ContentId>> {
    let mut stmt = conn.prepare(
        "SELECT c.id FROM contents c
         WHERE NOT EXISTS (SELECT 1 FROM paths p WHERE p.content_id = c.id)
         ORDER BY c.id",
    )?;
    let ids = stmt
        .query_map([], |row| Ok(ContentId(row.get(0)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}
