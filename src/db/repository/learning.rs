//! Learning record persistence, keyed by `(learning_type, pattern_key)`.

use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::enums::LearningType;
use crate::models::WorkflowLearning;

const LEARNING_COLUMNS: &str = "id, learning_type, pattern_key, sample_count, success_count, \
     avg_processing_ms, avg_anomaly_count, confidence_score, \
     field_frequencies, anomaly_frequencies, created_at, updated_at";

fn learning_from_row(row: &Row) -> Result<WorkflowLearning, DatabaseError> {
    let id: String = row.get(0)?;
    let learning_type: String = row.get(1)?;
    let field_frequencies: String = row.get(8)?;
    let anomaly_frequencies: String = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(WorkflowLearning {
        id: Uuid::parse_str(&id).map_err(|_| DatabaseError::InvalidEnum {
            field: "workflow_learning.id".into(),
            value: id,
        })?,
        learning_type: LearningType::from_str(&learning_type)?,
        pattern_key: row.get(2)?,
        sample_count: row.get(3)?,
        success_count: row.get(4)?,
        avg_processing_ms: row.get(5)?,
        avg_anomaly_count: row.get(6)?,
        confidence_score: row.get(7)?,
        field_frequencies: serde_json::from_str(&field_frequencies)?,
        anomaly_frequencies: serde_json::from_str(&anomaly_frequencies)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

pub fn get_learning(
    conn: &Connection,
    learning_type: LearningType,
    pattern_key: &str,
) -> Result<Option<WorkflowLearning>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LEARNING_COLUMNS} FROM workflow_learning
         WHERE learning_type = ?1 AND pattern_key = ?2"
    ))?;
    let mut rows = stmt.query(params![learning_type.as_str(), pattern_key])?;
    match rows.next()? {
        Some(row) => Ok(Some(learning_from_row(row)?)),
        None => Ok(None),
    }
}

pub fn insert_learning(conn: &Connection, record: &WorkflowLearning) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO workflow_learning (id, learning_type, pattern_key, sample_count,
             success_count, avg_processing_ms, avg_anomaly_count, confidence_score,
             field_frequencies, anomaly_frequencies, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            record.id.to_string(),
            record.learning_type.as_str(),
            record.pattern_key,
            record.sample_count,
            record.success_count,
            record.avg_processing_ms,
            record.avg_anomaly_count,
            record.confidence_score,
            serde_json::to_string(&record.field_frequencies)?,
            serde_json::to_string(&record.anomaly_frequencies)?,
            format_ts(&record.created_at),
            format_ts(&record.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_learning(conn: &Connection, record: &WorkflowLearning) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE workflow_learning SET sample_count = ?2, success_count = ?3,
             avg_processing_ms = ?4, avg_anomaly_count = ?5, confidence_score = ?6,
             field_frequencies = ?7, anomaly_frequencies = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            record.id.to_string(),
            record.sample_count,
            record.success_count,
            record.avg_processing_ms,
            record.avg_anomaly_count,
            record.confidence_score,
            serde_json::to_string(&record.field_frequencies)?,
            serde_json::to_string(&record.anomaly_frequencies)?,
            format_ts(&record.updated_at),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "workflow_learning".into(),
            id: record.id.to_string(),
        });
    }
    Ok(())
}

pub fn list_learning(
    conn: &Connection,
    learning_type: Option<LearningType>,
) -> Result<Vec<WorkflowLearning>, DatabaseError> {
    let mut records = Vec::new();
    match learning_type {
        Some(lt) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEARNING_COLUMNS} FROM workflow_learning
                 WHERE learning_type = ?1 ORDER BY pattern_key"
            ))?;
            let mut rows = stmt.query(params![lt.as_str()])?;
            while let Some(row) = rows.next()? {
                records.push(learning_from_row(row)?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEARNING_COLUMNS} FROM workflow_learning
                 ORDER BY learning_type, pattern_key"
            ))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                records.push(learning_from_row(row)?);
            }
        }
    }
    Ok(records)
}
