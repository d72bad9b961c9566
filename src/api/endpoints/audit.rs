//! Audit trail reads and retention maintenance.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{list_audit_entries, prune_audit_log, query_audit_by_entity};

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

/// `GET /api/audit` — recent entries, optionally filtered to one entity.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Value>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    let entries = match (query.entity_type.as_deref(), query.entity_id.as_deref()) {
        (Some(entity_type), Some(entity_id)) => {
            query_audit_by_entity(&conn, entity_type, entity_id)?
        }
        (None, None) => list_audit_entries(&conn, query.limit.unwrap_or(100))?,
        _ => {
            return Err(ApiError::BadRequest(
                "entity_type and entity_id must be provided together".into(),
            ))
        }
    };
    Ok(Json(json!({ "entries": entries })))
}

#[derive(Debug, Deserialize)]
pub struct PruneRequest {
    pub retention_days: i64,
}

/// `POST /api/audit/prune` — delete entries older than the retention window.
pub async fn prune(
    State(ctx): State<ApiContext>,
    Json(body): Json<PruneRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.retention_days < 1 {
        return Err(ApiError::BadRequest("retention_days must be positive".into()));
    }
    let conn = ctx.db.lock().unwrap();
    let pruned = prune_audit_log(&conn, body.retention_days)?;
    tracing::info!(pruned, retention_days = body.retention_days, "Audit log pruned");
    Ok(Json(json!({ "success": true, "pruned": pruned })))
}
