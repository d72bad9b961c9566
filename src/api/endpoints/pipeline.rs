//! Pipeline entry point.

use axum::http::StatusCode;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::{run_blocking, DocumentRef};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::{DocumentPipeline, PipelineFailure, PipelineReport};

/// `POST /api/pipeline/run` — process one document through every remaining
/// stage. A failed stage returns 500 with the failing stage and the partial
/// stage list.
pub async fn run(
    State(ctx): State<ApiContext>,
    Json(body): Json<DocumentRef>,
) -> Result<Response, ApiError> {
    let document_id = body.resolve()?;

    let result: Result<PipelineReport, PipelineFailure> = run_blocking(move || {
        let conn = ctx.db.lock().unwrap();
        Ok(DocumentPipeline::new(&conn, ctx.llm.as_ref(), &ctx.model).run(&document_id))
    })
    .await?;

    match result {
        Ok(report) => Ok(Json(json!({
            "success": true,
            "document_id": report.document_id,
            "stages_completed": report.stages_completed,
            "resumed_from": report.resumed_from,
            "processing_time_ms": report.processing_time_ms,
        }))
        .into_response()),
        Err(PipelineFailure {
            error: crate::pipeline::PipelineError::Database(e),
            ..
        }) => Err(e.into()),
        Err(failure) => {
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Pipeline failed",
                    "details": failure.error.to_string(),
                    "stage": failure.stage,
                    "stages_completed": failure.stages_completed,
                })),
            )
                .into_response())
        }
    }
}
