pub mod runner;

pub use runner::{cancel_execution, execute_workflow, WorkflowOutcome};

use thiserror::Error;

use crate::db::DatabaseError;
use crate::engine::EngineError;
use crate::models::enums::PipelineStage;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Pipeline failed at stage {stage}: {reason}")]
    Pipeline { stage: PipelineStage, reason: String },

    #[error("Workflow '{0}' is disabled")]
    Disabled(String),

    #[error("Execution {0} is not running")]
    NotRunning(String),
}
