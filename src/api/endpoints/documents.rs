//! Document ingestion and retrieval. Upstream OCR is out of scope; records
//! arrive as JSON with whatever extracted data the caller already has.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{delete_document, get_document, insert_document, list_documents};
use crate::models::enums::DocumentStatus;
use crate::models::Document;

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub owner_email: Option<String>,
    pub document_class: Option<String>,
    pub file_type: Option<String>,
    pub status: Option<DocumentStatus>,
    #[serde(default)]
    pub key_data_points: HashMap<String, String>,
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Json(body): Json<CreateDocumentRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".into()));
    }

    let mut doc = Document::new(body.title.trim());
    doc.owner_email = body.owner_email;
    doc.document_class = body.document_class;
    doc.file_type = body.file_type;
    doc.key_data_points = body.key_data_points;
    if let Some(status) = body.status {
        doc.status = status;
    }

    let conn = ctx.db.lock().unwrap();
    insert_document(&conn, &doc)?;
    tracing::info!(document_id = %doc.id, title = %doc.title, "Document created");
    Ok(Json(json!({ "success": true, "document": doc })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    let documents = list_documents(&conn, query.limit.unwrap_or(50))?;
    Ok(Json(json!({ "documents": documents })))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    let doc = get_document(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("document {id} not found")))?;
    Ok(Json(doc))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    delete_document(&conn, &id)?;
    Ok(Json(json!({ "success": true })))
}
