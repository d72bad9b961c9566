//! Workflow definitions and their execution records. Steps and step results
//! are stored as JSON arrays.

use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::enums::ExecutionStatus;
use crate::models::{Workflow, WorkflowExecution};

const WORKFLOW_COLUMNS: &str = "id, name, description, steps, enabled, created_at";
const EXECUTION_COLUMNS: &str = "id, workflow_id, document_id, status, current_step, \
     steps_completed, duration_ms, error, started_at, finished_at";

fn workflow_from_row(row: &Row) -> Result<Workflow, DatabaseError> {
    let id: String = row.get(0)?;
    let steps: String = row.get(3)?;
    let created_at: String = row.get(5)?;

    Ok(Workflow {
        id: Uuid::parse_str(&id).map_err(|_| DatabaseError::InvalidEnum {
            field: "workflows.id".into(),
            value: id,
        })?,
        name: row.get(1)?,
        description: row.get(2)?,
        steps: serde_json::from_str(&steps)?,
        enabled: row.get::<_, i64>(4)? != 0,
        created_at: parse_ts(&created_at),
    })
}

fn execution_from_row(row: &Row) -> Result<WorkflowExecution, DatabaseError> {
    let id: String = row.get(0)?;
    let workflow_id: String = row.get(1)?;
    let document_id: String = row.get(2)?;
    let status: String = row.get(3)?;
    let steps_completed: String = row.get(5)?;
    let started_at: String = row.get(8)?;
    let finished_at: Option<String> = row.get(9)?;

    let parse_id = |field: &str, value: String| {
        Uuid::parse_str(&value).map_err(|_| DatabaseError::InvalidEnum {
            field: field.into(),
            value,
        })
    };

    Ok(WorkflowExecution {
        id: parse_id("workflow_executions.id", id)?,
        workflow_id: parse_id("workflow_executions.workflow_id", workflow_id)?,
        document_id: parse_id("workflow_executions.document_id", document_id)?,
        status: ExecutionStatus::from_str(&status)?,
        current_step: row.get(4)?,
        steps_completed: serde_json::from_str(&steps_completed)?,
        duration_ms: row.get(6)?,
        error: row.get(7)?,
        started_at: parse_ts(&started_at),
        finished_at: finished_at.map(|s| parse_ts(&s)),
    })
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

pub fn insert_workflow(conn: &Connection, workflow: &Workflow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO workflows (id, name, description, steps, enabled, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            workflow.id.to_string(),
            workflow.name,
            workflow.description,
            serde_json::to_string(&workflow.steps)?,
            workflow.enabled as i64,
            format_ts(&workflow.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_workflow(conn: &Connection, id: &Uuid) -> Result<Option<Workflow>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(workflow_from_row(row)?)),
        None => Ok(None),
    }
}

pub fn list_workflows(conn: &Connection) -> Result<Vec<Workflow>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {WORKFLOW_COLUMNS} FROM workflows ORDER BY created_at, id"
    ))?;
    let mut rows = stmt.query([])?;
    let mut workflows = Vec::new();
    while let Some(row) = rows.next()? {
        workflows.push(workflow_from_row(row)?);
    }
    Ok(workflows)
}

pub fn update_workflow(conn: &Connection, workflow: &Workflow) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE workflows SET name = ?2, description = ?3, steps = ?4, enabled = ?5
         WHERE id = ?1",
        params![
            workflow.id.to_string(),
            workflow.name,
            workflow.description,
            serde_json::to_string(&workflow.steps)?,
            workflow.enabled as i64,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "workflow".into(),
            id: workflow.id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_workflow(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM workflows WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "workflow".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

pub fn insert_execution(
    conn: &Connection,
    execution: &WorkflowExecution,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO workflow_executions (id, workflow_id, document_id, status, current_step,
             steps_completed, duration_ms, error, started_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            execution.id.to_string(),
            execution.workflow_id.to_string(),
            execution.document_id.to_string(),
            execution.status.as_str(),
            execution.current_step,
            serde_json::to_string(&execution.steps_completed)?,
            execution.duration_ms,
            execution.error,
            format_ts(&execution.started_at),
            execution.finished_at.as_ref().map(format_ts),
        ],
    )?;
    Ok(())
}

pub fn get_execution(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<WorkflowExecution>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(execution_from_row(row)?)),
        None => Ok(None),
    }
}

pub fn update_execution(
    conn: &Connection,
    execution: &WorkflowExecution,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE workflow_executions SET status = ?2, current_step = ?3, steps_completed = ?4,
             duration_ms = ?5, error = ?6, finished_at = ?7
         WHERE id = ?1",
        params![
            execution.id.to_string(),
            execution.status.as_str(),
            execution.current_step,
            serde_json::to_string(&execution.steps_completed)?,
            execution.duration_ms,
            execution.error,
            execution.finished_at.as_ref().map(format_ts),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "workflow_execution".into(),
            id: execution.id.to_string(),
        });
    }
    Ok(())
}

pub fn list_executions_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<WorkflowExecution>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXECUTION_COLUMNS} FROM workflow_executions
         WHERE document_id = ?1 ORDER BY started_at DESC, id"
    ))?;
    let mut rows = stmt.query(params![document_id.to_string()])?;
    let mut executions = Vec::new();
    while let Some(row) = rows.next()? {
        executions.push(execution_from_row(row)?);
    }
    Ok(executions)
}
