//! Document processing pipeline: a fixed sequence of stages, most of them
//! backed by an LLM extraction call, driven by a resumable orchestrator.

pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod stages;

pub use llm::{LlmClient, MockLlmClient, OllamaClient};
pub use orchestrator::{DocumentPipeline, PipelineFailure, PipelineReport, StageReport};
pub use stages::STAGE_SEQUENCE;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::enums::PipelineStage;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Cannot connect to Ollama at {0}. Is Ollama running?")]
    Connection(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM returned error status {status}: {body}")]
    LlmError { status: u16, body: String },

    #[error("Failed to parse LLM response: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Stage {stage} failed after {attempts} attempts: {reason}")]
    StageFailed {
        stage: PipelineStage,
        attempts: u32,
        reason: String,
    },
}

impl PipelineError {
    /// Transient LLM failures are retried; database and contract errors
    /// are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Timeout(_)
                | Self::LlmError { .. }
                | Self::ResponseParsing(_)
                | Self::HttpClient(_)
        )
    }
}
