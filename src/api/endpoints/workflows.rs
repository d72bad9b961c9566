//! Workflow administration and execution.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Identity};
use crate::db::repository::{
    delete_workflow, get_execution, get_workflow, insert_workflow, list_executions_for_document,
    list_workflows, update_workflow,
};
use crate::models::{Workflow, WorkflowExecution, WorkflowStep};
use crate::workflow::{cancel_execution, execute_workflow, WorkflowOutcome};

#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Json(body): Json<WorkflowRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }
    let workflow = Workflow {
        id: Uuid::new_v4(),
        name: body.name.trim().to_string(),
        description: body.description,
        steps: body.steps,
        enabled: body.enabled,
        created_at: chrono::Local::now().naive_local(),
    };

    let conn = ctx.db.lock().unwrap();
    insert_workflow(&conn, &workflow)?;
    tracing::info!(workflow_id = %workflow.id, name = %workflow.name, "Workflow created");
    Ok(Json(json!({ "success": true, "workflow": workflow })))
}

pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Value>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    let workflows = list_workflows(&conn)?;
    Ok(Json(json!({ "workflows": workflows })))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Workflow>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    let workflow = get_workflow(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("workflow {id} not found")))?;
    Ok(Json(workflow))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<WorkflowRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }
    let conn = ctx.db.lock().unwrap();
    let mut workflow = get_workflow(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("workflow {id} not found")))?;
    workflow.name = body.name.trim().to_string();
    workflow.description = body.description;
    workflow.steps = body.steps;
    workflow.enabled = body.enabled;
    update_workflow(&conn, &workflow)?;
    Ok(Json(json!({ "success": true, "workflow": workflow })))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    delete_workflow(&conn, &id)?;
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub workflow_id: Uuid,
    pub document_id: Uuid,
}

/// `POST /api/workflows/execute` — run one workflow against one document.
/// Step failures return 500 with `failed_at_step` and the step records
/// produced so far.
pub async fn execute(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<ExecuteRequest>,
) -> Result<Response, ApiError> {
    let outcome = run_blocking(move || {
        let conn = ctx.db.lock().unwrap();
        execute_workflow(
            &conn,
            ctx.llm.as_ref(),
            &ctx.model,
            ctx.mailer.as_ref(),
            &identity.email,
            &body.workflow_id,
            &body.document_id,
        )
        .map_err(ApiError::from)
    })
    .await?;

    match outcome {
        WorkflowOutcome::Completed(execution) => Ok(Json(json!({
            "success": true,
            "execution_id": execution.id,
            "status": execution.status,
            "steps_completed": execution.steps_completed,
            "duration_ms": execution.duration_ms,
        }))
        .into_response()),
        WorkflowOutcome::Cancelled(execution) => Ok(Json(json!({
            "success": false,
            "execution_id": execution.id,
            "status": execution.status,
            "steps_completed": execution.steps_completed,
        }))
        .into_response()),
        WorkflowOutcome::Failed {
            execution,
            failed_at_step,
        } => Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Workflow execution failed",
                "details": execution.error,
                "failed_at_step": failed_at_step,
                "execution_id": execution.id,
                "steps_completed": execution.steps_completed,
            })),
        )
            .into_response()),
    }
}

pub async fn execution_detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowExecution>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    let execution = get_execution(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("workflow_execution {id} not found")))?;
    Ok(Json(execution))
}

/// `GET /api/documents/:id/executions` — execution history for a document,
/// newest first.
pub async fn executions_for_document(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    let executions = list_executions_for_document(&conn, &id)?;
    Ok(Json(json!({ "executions": executions })))
}

/// `POST /api/executions/:id/cancel` — control action, audited.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    let execution = cancel_execution(&conn, &identity.email, &id)?;
    Ok(Json(json!({
        "success": true,
        "execution_id": execution.id,
        "status": execution.status,
    })))
}
