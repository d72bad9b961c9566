//! Workflow execution. A workflow is an ordered list of steps, each step
//! composing one of the core engines; the execution record is persisted
//! step-by-step so progress survives a crash and cancellation is visible
//! between steps.

use chrono::Local;
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

use super::WorkflowError;
use crate::db::repository::{
    get_document, get_execution, get_workflow, insert_audit_entry, insert_execution,
    update_document, update_execution,
};
use crate::db::DatabaseError;
use crate::engine::trigger::RunOutcome;
use crate::engine::{learning, trigger, Mailer, ObserveOutcome};
use crate::models::enums::{DocumentStatus, ExecutionStatus, StepStatus, WorkflowStepType};
use crate::models::{AuditEntry, StepRecord, WorkflowExecution, WorkflowStep};
use crate::pipeline::{DocumentPipeline, LlmClient};

#[derive(Debug)]
pub enum WorkflowOutcome {
    Completed(WorkflowExecution),
    Failed {
        execution: WorkflowExecution,
        failed_at_step: String,
    },
    Cancelled(WorkflowExecution),
}

enum StepOutcome {
    Completed(Value),
    Skipped(String),
    Failed(String),
}

/// Run one workflow against one document.
#[allow(clippy::too_many_arguments)]
pub fn execute_workflow(
    conn: &Connection,
    llm: &dyn LlmClient,
    model: &str,
    mailer: &dyn Mailer,
    actor: &str,
    workflow_id: &Uuid,
    document_id: &Uuid,
) -> Result<WorkflowOutcome, WorkflowError> {
    let workflow = get_workflow(conn, workflow_id)?.ok_or(DatabaseError::NotFound {
        entity_type: "workflow".into(),
        id: workflow_id.to_string(),
    })?;
    get_document(conn, document_id)?.ok_or(DatabaseError::NotFound {
        entity_type: "document".into(),
        id: document_id.to_string(),
    })?;

    if !workflow.enabled {
        return Err(WorkflowError::Disabled(workflow.name));
    }

    let started = std::time::Instant::now();
    let mut execution = WorkflowExecution::start(*workflow_id, *document_id);
    insert_execution(conn, &execution)?;
    insert_audit_entry(
        conn,
        &AuditEntry::new(
            "workflow_execution",
            &execution.id.to_string(),
            "execution_started",
            actor,
            json!({ "workflow": workflow.name, "document_id": document_id }),
        ),
    )?;
    tracing::info!(
        execution_id = %execution.id,
        workflow = %workflow.name,
        document_id = %document_id,
        steps = workflow.steps.len(),
        "Workflow execution started"
    );

    for step in &workflow.steps {
        // A cancel request lands between steps.
        if let Some(stored) = get_execution(conn, &execution.id)? {
            if stored.status == ExecutionStatus::Cancelled {
                execution.status = ExecutionStatus::Cancelled;
                execution.current_step = None;
                execution.duration_ms = Some(started.elapsed().as_millis() as i64);
                execution.finished_at = Some(Local::now().naive_local());
                update_execution(conn, &execution)?;
                tracing::info!(execution_id = %execution.id, "Workflow execution cancelled");
                return Ok(WorkflowOutcome::Cancelled(execution));
            }
        }

        execution.current_step = Some(step.id.clone());
        update_execution(conn, &execution)?;

        let step_started = Local::now().naive_local();
        let outcome = run_step(conn, llm, model, mailer, actor, step, document_id);

        match outcome {
            StepOutcome::Completed(result) => {
                execution.steps_completed.push(StepRecord {
                    step_id: step.id.clone(),
                    status: StepStatus::Completed,
                    result: Some(result),
                    started_at: step_started,
                    completed_at: Some(Local::now().naive_local()),
                });
                update_execution(conn, &execution)?;
            }
            StepOutcome::Skipped(reason) => {
                execution.steps_completed.push(StepRecord {
                    step_id: step.id.clone(),
                    status: StepStatus::Skipped,
                    result: Some(json!({ "reason": reason })),
                    started_at: step_started,
                    completed_at: Some(Local::now().naive_local()),
                });
                update_execution(conn, &execution)?;
            }
            StepOutcome::Failed(error) => {
                execution.steps_completed.push(StepRecord {
                    step_id: step.id.clone(),
                    status: StepStatus::Failed,
                    result: Some(json!({ "error": error })),
                    started_at: step_started,
                    completed_at: Some(Local::now().naive_local()),
                });
                execution.status = ExecutionStatus::Failed;
                execution.error = Some(error.clone());
                execution.duration_ms = Some(started.elapsed().as_millis() as i64);
                execution.finished_at = Some(Local::now().naive_local());
                update_execution(conn, &execution)?;
                insert_audit_entry(
                    conn,
                    &AuditEntry::new(
                        "workflow_execution",
                        &execution.id.to_string(),
                        "execution_failed",
                        actor,
                        json!({ "step": step.id, "error": error }),
                    ),
                )?;
                tracing::error!(
                    execution_id = %execution.id,
                    step = %step.id,
                    error = %error,
                    "Workflow execution failed"
                );
                return Ok(WorkflowOutcome::Failed {
                    execution,
                    failed_at_step: step.id.clone(),
                });
            }
        }
    }

    execution.status = ExecutionStatus::Completed;
    execution.current_step = None;
    execution.duration_ms = Some(started.elapsed().as_millis() as i64);
    execution.finished_at = Some(Local::now().naive_local());
    update_execution(conn, &execution)?;
    insert_audit_entry(
        conn,
        &AuditEntry::new(
            "workflow_execution",
            &execution.id.to_string(),
            "execution_completed",
            actor,
            json!({ "steps": execution.steps_completed.len() }),
        ),
    )?;
    tracing::info!(
        execution_id = %execution.id,
        duration_ms = execution.duration_ms,
        "Workflow execution completed"
    );
    Ok(WorkflowOutcome::Completed(execution))
}

fn run_step(
    conn: &Connection,
    llm: &dyn LlmClient,
    model: &str,
    mailer: &dyn Mailer,
    actor: &str,
    step: &WorkflowStep,
    document_id: &Uuid,
) -> StepOutcome {
    match step.step_type {
        WorkflowStepType::RunPipeline => {
            match DocumentPipeline::new(conn, llm, model).run(document_id) {
                Ok(report) => StepOutcome::Completed(json!({
                    "stages_completed": report.stages_completed.len(),
                    "processing_time_ms": report.processing_time_ms,
                })),
                Err(failure) => StepOutcome::Failed(format!(
                    "pipeline failed at stage {}: {}",
                    failure.stage.as_str(),
                    failure.error
                )),
            }
        }
        WorkflowStepType::EvaluateRules => {
            match trigger::run_triggers(conn, mailer, actor, document_id) {
                Ok(RunOutcome::Completed(report)) => StepOutcome::Completed(json!({
                    "rules_evaluated": report.rules_evaluated,
                    "triggered": report.triggered.len(),
                    "skipped_count": report.skipped.len(),
                })),
                Ok(RunOutcome::Skipped { reason }) => StepOutcome::Skipped(reason),
                Err(e) => StepOutcome::Failed(e.to_string()),
            }
        }
        WorkflowStepType::Learn => match learning::observe(conn, document_id) {
            Ok(ObserveOutcome::Observed { records_updated }) => {
                StepOutcome::Completed(json!({ "records_updated": records_updated }))
            }
            Ok(ObserveOutcome::Skipped { reason }) => StepOutcome::Skipped(reason),
            Err(e) => StepOutcome::Failed(e.to_string()),
        },
        WorkflowStepType::ApplyAction => apply_direct_action(conn, step, document_id),
    }
}

/// Direct document mutation driven by the step config: optional `tag`,
/// `note` and `status` keys.
fn apply_direct_action(conn: &Connection, step: &WorkflowStep, document_id: &Uuid) -> StepOutcome {
    let mut document = match get_document(conn, document_id) {
        Ok(Some(doc)) => doc,
        Ok(None) => return StepOutcome::Failed(format!("document {document_id} not found")),
        Err(e) => return StepOutcome::Failed(e.to_string()),
    };

    let mut applied = Vec::new();
    if let Some(tag) = step.config.get("tag").filter(|t| !t.is_empty()) {
        if document.add_tag(tag) {
            applied.push(format!("tag:{tag}"));
        }
    }
    if let Some(note) = step.config.get("note").filter(|n| !n.is_empty()) {
        document.append_auto_note(note);
        applied.push("note".into());
    }
    if let Some(status) = step.config.get("status") {
        match status.parse::<DocumentStatus>() {
            Ok(status) => {
                document.status = status;
                applied.push(format!("status:{}", status.as_str()));
            }
            Err(_) => return StepOutcome::Failed(format!("unknown status '{status}'")),
        }
    }

    if let Err(e) = update_document(conn, &document) {
        return StepOutcome::Failed(e.to_string());
    }
    StepOutcome::Completed(json!({ "applied": applied }))
}

/// Mark a running execution cancelled; the runner observes it between steps.
pub fn cancel_execution(
    conn: &Connection,
    actor: &str,
    execution_id: &Uuid,
) -> Result<WorkflowExecution, WorkflowError> {
    let mut execution = get_execution(conn, execution_id)?.ok_or(DatabaseError::NotFound {
        entity_type: "workflow_execution".into(),
        id: execution_id.to_string(),
    })?;

    if !matches!(
        execution.status,
        ExecutionStatus::Running | ExecutionStatus::Pending
    ) {
        return Err(WorkflowError::NotRunning(execution_id.to_string()));
    }

    execution.status = ExecutionStatus::Cancelled;
    execution.finished_at = Some(Local::now().naive_local());
    update_execution(conn, &execution)?;
    insert_audit_entry(
        conn,
        &AuditEntry::new(
            "workflow_execution",
            &execution_id.to_string(),
            "execution_cancelled",
            actor,
            json!({}),
        ),
    )?;
    tracing::info!(execution_id = %execution_id, "Execution marked cancelled");
    Ok(execution)
}
