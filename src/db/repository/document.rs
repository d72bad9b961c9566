//! Document persistence. JSON columns (key_data_points, tags, anomalies)
//! are serialized with serde_json; enum columns store the snake_case string.

use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::enums::{DocumentStatus, PipelineStage, TamperingRisk};
use crate::models::Document;

const DOCUMENT_COLUMNS: &str = "id, title, owner_email, document_class, file_type, status, \
     pipeline_stage, key_data_points, tags, notes, summary, anomalies, \
     tampering_risk, confidence, trust_score, processing_time_ms, created_at";

fn document_from_row(row: &Row) -> Result<Document, DatabaseError> {
    let id: String = row.get(0)?;
    let status: String = row.get(5)?;
    let pipeline_stage: Option<String> = row.get(6)?;
    let key_data_points: String = row.get(7)?;
    let tags: String = row.get(8)?;
    let anomalies: String = row.get(11)?;
    let tampering_risk: Option<String> = row.get(12)?;
    let created_at: String = row.get(16)?;

    Ok(Document {
        id: Uuid::parse_str(&id).map_err(|_| DatabaseError::InvalidEnum {
            field: "documents.id".into(),
            value: id,
        })?,
        title: row.get(1)?,
        owner_email: row.get(2)?,
        document_class: row.get(3)?,
        file_type: row.get(4)?,
        status: DocumentStatus::from_str(&status)?,
        pipeline_stage: pipeline_stage
            .map(|s| PipelineStage::from_str(&s))
            .transpose()?,
        key_data_points: serde_json::from_str(&key_data_points)?,
        tags: serde_json::from_str(&tags)?,
        notes: row.get(9)?,
        summary: row.get(10)?,
        anomalies: serde_json::from_str(&anomalies)?,
        tampering_risk: tampering_risk
            .map(|s| TamperingRisk::from_str(&s))
            .transpose()?,
        confidence: row.get(13)?,
        trust_score: row.get(14)?,
        processing_time_ms: row.get(15)?,
        created_at: parse_ts(&created_at),
    })
}

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, title, owner_email, document_class, file_type, status,
             pipeline_stage, key_data_points, tags, notes, summary, anomalies,
             tampering_risk, confidence, trust_score, processing_time_ms, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            doc.id.to_string(),
            doc.title,
            doc.owner_email,
            doc.document_class,
            doc.file_type,
            doc.status.as_str(),
            doc.pipeline_stage.map(|s| s.as_str()),
            serde_json::to_string(&doc.key_data_points)?,
            serde_json::to_string(&doc.tags)?,
            doc.notes,
            doc.summary,
            serde_json::to_string(&doc.anomalies)?,
            doc.tampering_risk.map(|r| r.as_str()),
            doc.confidence,
            doc.trust_score,
            doc.processing_time_ms,
            format_ts(&doc.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(document_from_row(row)?)),
        None => Ok(None),
    }
}

/// Overwrite every mutable column of an existing document.
pub fn update_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE documents SET title = ?2, owner_email = ?3, document_class = ?4,
             file_type = ?5, status = ?6, pipeline_stage = ?7, key_data_points = ?8,
             tags = ?9, notes = ?10, summary = ?11, anomalies = ?12, tampering_risk = ?13,
             confidence = ?14, trust_score = ?15, processing_time_ms = ?16
         WHERE id = ?1",
        params![
            doc.id.to_string(),
            doc.title,
            doc.owner_email,
            doc.document_class,
            doc.file_type,
            doc.status.as_str(),
            doc.pipeline_stage.map(|s| s.as_str()),
            serde_json::to_string(&doc.key_data_points)?,
            serde_json::to_string(&doc.tags)?,
            doc.notes,
            doc.summary,
            serde_json::to_string(&doc.anomalies)?,
            doc.tampering_risk.map(|r| r.as_str()),
            doc.confidence,
            doc.trust_score,
            doc.processing_time_ms,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "document".into(),
            id: doc.id.to_string(),
        });
    }
    Ok(())
}

pub fn update_document_status(
    conn: &Connection,
    id: &Uuid,
    status: DocumentStatus,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE documents SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "document".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Persist the resume marker after each completed pipeline stage.
pub fn update_pipeline_stage(
    conn: &Connection,
    id: &Uuid,
    stage: Option<PipelineStage>,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE documents SET pipeline_stage = ?2 WHERE id = ?1",
        params![id.to_string(), stage.map(|s| s.as_str())],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "document".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn list_documents(conn: &Connection, limit: i64) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC, id LIMIT ?1"
    ))?;
    let mut rows = stmt.query(params![limit])?;
    let mut docs = Vec::new();
    while let Some(row) = rows.next()? {
        docs.push(document_from_row(row)?);
    }
    Ok(docs)
}

pub fn delete_document(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM documents WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "document".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
