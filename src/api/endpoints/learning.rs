//! Learning aggregator entry point and read access to learned patterns.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{run_blocking, DocumentRef};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::list_learning;
use crate::engine::learning::{observe, ObserveOutcome};
use crate::models::enums::LearningType;

/// `POST /api/learning/observe` — feed one completed document into the
/// learning records.
pub async fn observe_document(
    State(ctx): State<ApiContext>,
    Json(body): Json<DocumentRef>,
) -> Result<Json<Value>, ApiError> {
    let document_id = body.resolve()?;

    let outcome = run_blocking(move || {
        let conn = ctx.db.lock().unwrap();
        observe(&conn, &document_id).map_err(ApiError::from)
    })
    .await?;

    match outcome {
        ObserveOutcome::Skipped { reason } => {
            Ok(Json(json!({ "skipped": true, "reason": reason })))
        }
        ObserveOutcome::Observed { records_updated } => Ok(Json(json!({
            "success": true,
            "document_id": document_id,
            "records_updated": records_updated,
        }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct LearningQuery {
    #[serde(rename = "type")]
    pub learning_type: Option<LearningType>,
}

/// `GET /api/learning?type=routing_pattern` — learned pattern records.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<LearningQuery>,
) -> Result<Json<Value>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    let records = list_learning(&conn, query.learning_type)?;
    Ok(Json(json!({ "patterns": records })))
}
