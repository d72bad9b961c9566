//! Trigger rule persistence. The fired counter is only ever changed through
//! `record_rule_fired`, which increments in SQL so concurrent evaluation
//! runs cannot lose updates.

use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::enums::{ActionType, TriggerType};
use crate::models::TriggerRule;

const RULE_COLUMNS: &str = "id, name, description, document_class, trigger_field, trigger_type, \
     match_value, days_threshold, action_type, action_config, enabled, \
     times_fired, last_fired_at, created_at";

fn rule_from_row(row: &Row) -> Result<TriggerRule, DatabaseError> {
    let id: String = row.get(0)?;
    let trigger_type: String = row.get(5)?;
    let action_type: String = row.get(8)?;
    let action_config: String = row.get(9)?;
    let last_fired_at: Option<String> = row.get(12)?;
    let created_at: String = row.get(13)?;

    Ok(TriggerRule {
        id: Uuid::parse_str(&id).map_err(|_| DatabaseError::InvalidEnum {
            field: "trigger_rules.id".into(),
            value: id,
        })?,
        name: row.get(1)?,
        description: row.get(2)?,
        document_class: row.get(3)?,
        trigger_field: row.get(4)?,
        trigger_type: TriggerType::from_str(&trigger_type)?,
        match_value: row.get(6)?,
        days_threshold: row.get(7)?,
        action_type: ActionType::from_str(&action_type)?,
        action_config: serde_json::from_str(&action_config)?,
        enabled: row.get::<_, i64>(10)? != 0,
        times_fired: row.get(11)?,
        last_fired_at: last_fired_at.map(|s| parse_ts(&s)),
        created_at: parse_ts(&created_at),
    })
}

pub fn insert_rule(conn: &Connection, rule: &TriggerRule) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO trigger_rules (id, name, description, document_class, trigger_field,
             trigger_type, match_value, days_threshold, action_type, action_config,
             enabled, times_fired, last_fired_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            rule.id.to_string(),
            rule.name,
            rule.description,
            rule.document_class,
            rule.trigger_field,
            rule.trigger_type.as_str(),
            rule.match_value,
            rule.days_threshold,
            rule.action_type.as_str(),
            serde_json::to_string(&rule.action_config)?,
            rule.enabled as i64,
            rule.times_fired,
            rule.last_fired_at.as_ref().map(format_ts),
            format_ts(&rule.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_rule(conn: &Connection, id: &Uuid) -> Result<Option<TriggerRule>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM trigger_rules WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(rule_from_row(row)?)),
        None => Ok(None),
    }
}

pub fn list_rules(conn: &Connection) -> Result<Vec<TriggerRule>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM trigger_rules ORDER BY created_at, id"
    ))?;
    let mut rows = stmt.query([])?;
    let mut rules = Vec::new();
    while let Some(row) = rows.next()? {
        rules.push(rule_from_row(row)?);
    }
    Ok(rules)
}

/// Rules the evaluation engine considers, in stable creation order.
pub fn get_enabled_rules(conn: &Connection) -> Result<Vec<TriggerRule>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM trigger_rules WHERE enabled = 1 ORDER BY created_at, id"
    ))?;
    let mut rows = stmt.query([])?;
    let mut rules = Vec::new();
    while let Some(row) = rows.next()? {
        rules.push(rule_from_row(row)?);
    }
    Ok(rules)
}

/// Definition update; the engine-owned columns (times_fired, last_fired_at)
/// are excluded so a concurrent firing is never overwritten.
pub fn update_rule(conn: &Connection, rule: &TriggerRule) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE trigger_rules SET name = ?2, description = ?3, document_class = ?4,
             trigger_field = ?5, trigger_type = ?6, match_value = ?7, days_threshold = ?8,
             action_type = ?9, action_config = ?10, enabled = ?11
         WHERE id = ?1",
        params![
            rule.id.to_string(),
            rule.name,
            rule.description,
            rule.document_class,
            rule.trigger_field,
            rule.trigger_type.as_str(),
            rule.match_value,
            rule.days_threshold,
            rule.action_type.as_str(),
            serde_json::to_string(&rule.action_config)?,
            rule.enabled as i64,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "trigger_rule".into(),
            id: rule.id.to_string(),
        });
    }
    Ok(())
}

/// Atomic read-modify-write of the firing counter.
pub fn record_rule_fired(
    conn: &Connection,
    id: &Uuid,
    fired_at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE trigger_rules
         SET times_fired = times_fired + 1, last_fired_at = ?2
         WHERE id = ?1",
        params![id.to_string(), format_ts(fired_at)],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "trigger_rule".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_rule(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM trigger_rules WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "trigger_rule".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
