//! Trigger engine entry point.

use axum::extract::State;
use axum::{Extension, Json};
use serde_json::{json, Value};

use super::{run_blocking, DocumentRef};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Identity};
use crate::engine::trigger::{run_triggers, RunOutcome};

/// `POST /api/triggers/run` — evaluate all enabled rules against one
/// document. Preconditions that are not met return 200 with
/// `{skipped: true, reason}`.
pub async fn run(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<DocumentRef>,
) -> Result<Json<Value>, ApiError> {
    let document_id = body.resolve()?;

    // Actions may send mail through a blocking HTTP client.
    let outcome = run_blocking(move || {
        let conn = ctx.db.lock().unwrap();
        run_triggers(&conn, ctx.mailer.as_ref(), &identity.email, &document_id)
            .map_err(ApiError::from)
    })
    .await?;

    match outcome {
        RunOutcome::Skipped { reason } => Ok(Json(json!({ "skipped": true, "reason": reason }))),
        RunOutcome::Completed(report) => Ok(Json(json!({
            "success": true,
            "document_id": document_id,
            "rules_evaluated": report.rules_evaluated,
            "triggered": report.triggered,
            "skipped_count": report.skipped.len(),
        }))),
    }
}
