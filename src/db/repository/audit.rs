//! Append-only audit log.

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::AuditEntry;

const AUDIT_COLUMNS: &str = "id, entity_type, entity_id, action, user_email, timestamp, changes";

fn entry_from_row(row: &Row) -> Result<AuditEntry, DatabaseError> {
    let id: String = row.get(0)?;
    let timestamp: String = row.get(5)?;
    let changes: String = row.get(6)?;

    Ok(AuditEntry {
        id: Uuid::parse_str(&id).map_err(|_| DatabaseError::InvalidEnum {
            field: "audit_log.id".into(),
            value: id,
        })?,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        action: row.get(3)?,
        user_email: row.get(4)?,
        timestamp: parse_ts(&timestamp),
        changes: serde_json::from_str(&changes)?,
    })
}

pub fn insert_audit_entry(conn: &Connection, entry: &AuditEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (id, entity_type, entity_id, action, user_email, timestamp, changes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.id.to_string(),
            entry.entity_type,
            entry.entity_id,
            entry.action,
            entry.user_email,
            format_ts(&entry.timestamp),
            serde_json::to_string(&entry.changes)?,
        ],
    )?;
    Ok(())
}

pub fn list_audit_entries(conn: &Connection, limit: i64) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AUDIT_COLUMNS} FROM audit_log ORDER BY timestamp DESC, id LIMIT ?1"
    ))?;
    let mut rows = stmt.query(params![limit])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(entry_from_row(row)?);
    }
    Ok(entries)
}

pub fn query_audit_by_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AUDIT_COLUMNS} FROM audit_log
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id"
    ))?;
    let mut rows = stmt.query(params![entity_type, entity_id])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(entry_from_row(row)?);
    }
    Ok(entries)
}

/// Delete entries older than the retention window. Returns the number removed.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let cutoff = chrono::Local::now().naive_local() - chrono::Duration::days(retention_days);
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < ?1",
        params![format_ts(&cutoff)],
    )?;
    Ok(deleted)
}
