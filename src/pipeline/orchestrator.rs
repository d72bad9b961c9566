//! Pipeline orchestrator. Runs the fixed stage sequence against one
//! document with bounded per-stage retry and exponential backoff, resuming
//! a previously failed run from its persisted stage marker.

use chrono::Local;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::llm::LlmClient;
use super::stages::{run_stage, STAGE_SEQUENCE};
use super::PipelineError;
use crate::db::repository::{
    get_document, update_document, update_document_status, update_pipeline_stage,
};
use crate::db::DatabaseError;
use crate::models::enums::{DocumentStatus, PipelineStage};
use crate::models::Document;

const MAX_STAGE_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: PipelineStage,
    pub status: &'static str,
    pub attempts: u32,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub document_id: Uuid,
    pub stages_completed: Vec<StageReport>,
    pub resumed_from: Option<PipelineStage>,
    pub processing_time_ms: Option<i64>,
}

/// A failed run: the stage that gave up, plus whatever completed before it.
#[derive(Debug)]
pub struct PipelineFailure {
    pub stage: PipelineStage,
    pub error: PipelineError,
    pub stages_completed: Vec<StageReport>,
}

pub struct DocumentPipeline<'a> {
    conn: &'a Connection,
    llm: &'a dyn LlmClient,
    model: &'a str,
}

impl<'a> DocumentPipeline<'a> {
    pub fn new(conn: &'a Connection, llm: &'a dyn LlmClient, model: &'a str) -> Self {
        Self { conn, llm, model }
    }

    /// Process one document through every remaining stage.
    pub fn run(&self, document_id: &Uuid) -> Result<PipelineReport, PipelineFailure> {
        self.run_inner(document_id).map_err(|(stage, error, done)| {
            // Leave the stage marker pointing at the failed stage so the
            // next run resumes there.
            if let Err(e) = update_document_status(self.conn, document_id, DocumentStatus::Failed)
            {
                tracing::error!(document_id = %document_id, error = %e, "Failed to mark document failed");
            }
            tracing::error!(
                document_id = %document_id,
                stage = stage.as_str(),
                error = %error,
                "Pipeline aborted"
            );
            PipelineFailure {
                stage,
                error,
                stages_completed: done,
            }
        })
    }

    #[allow(clippy::type_complexity)]
    fn run_inner(
        &self,
        document_id: &Uuid,
    ) -> Result<PipelineReport, (PipelineStage, PipelineError, Vec<StageReport>)> {
        let started = std::time::Instant::now();

        let mut document = match self.load(document_id) {
            Ok(doc) => doc,
            Err(e) => return Err((PipelineStage::Preservation, e, Vec::new())),
        };

        // A completed document reprocesses from the top; a failed one
        // resumes at the stage its marker points to.
        let resumed_from = match (document.status, document.pipeline_stage) {
            (DocumentStatus::Completed, _) | (_, None) => None,
            (_, Some(marker)) => Some(marker),
        };
        let start_index = resumed_from
            .and_then(|marker| STAGE_SEQUENCE.iter().position(|s| *s == marker))
            .unwrap_or(0);

        if let Some(marker) = resumed_from {
            tracing::info!(
                document_id = %document_id,
                stage = marker.as_str(),
                "Resuming pipeline from persisted stage"
            );
        }

        let mut stages_completed = Vec::new();

        for &stage in &STAGE_SEQUENCE[start_index..] {
            if let Err(e) = update_pipeline_stage(self.conn, document_id, Some(stage)) {
                return Err((stage, e.into(), stages_completed));
            }

            let (result, attempts) = match self.run_with_retry(stage, &mut document) {
                Ok(ok) => ok,
                Err(e) => return Err((stage, e, stages_completed)),
            };

            if let Err(e) = update_document(self.conn, &document) {
                return Err((stage, e.into(), stages_completed));
            }

            tracing::info!(
                document_id = %document_id,
                stage = stage.as_str(),
                attempts,
                "Stage completed"
            );
            stages_completed.push(StageReport {
                stage,
                status: "completed",
                attempts,
                result,
            });
        }

        tracing::info!(
            document_id = %document_id,
            stages = stages_completed.len(),
            elapsed_ms = started.elapsed().as_millis() as i64,
            "Pipeline completed"
        );
        Ok(PipelineReport {
            document_id: *document_id,
            stages_completed,
            resumed_from,
            processing_time_ms: document.processing_time_ms,
        })
    }

    fn load(&self, document_id: &Uuid) -> Result<Document, PipelineError> {
        get_document(self.conn, document_id)?
            .ok_or(DatabaseError::NotFound {
                entity_type: "document".into(),
                id: document_id.to_string(),
            })
            .map_err(Into::into)
    }

    /// Bounded retry with exponential backoff. Stage mutations only apply on
    /// the successful attempt, so retrying re-runs the stage cleanly.
    fn run_with_retry(
        &self,
        stage: PipelineStage,
        document: &mut Document,
    ) -> Result<(Value, u32), PipelineError> {
        let mut last_error = None;
        for attempt in 1..=MAX_STAGE_ATTEMPTS {
            match run_stage(stage, document, self.llm, self.model) {
                Ok(result) => return Ok((result, attempt)),
                Err(e) if e.is_retryable() && attempt < MAX_STAGE_ATTEMPTS => {
                    let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1);
                    tracing::warn!(
                        document_id = %document.id,
                        stage = stage.as_str(),
                        attempt,
                        delay_ms = delay,
                        error = %e,
                        "Stage attempt failed, retrying"
                    );
                    std::thread::sleep(std::time::Duration::from_millis(delay));
                    last_error = Some(e);
                }
                Err(e) if e.is_retryable() => {
                    return Err(PipelineError::StageFailed {
                        stage,
                        attempts: MAX_STAGE_ATTEMPTS,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        // Loop always returns; keep the compiler satisfied.
        Err(last_error.unwrap_or(PipelineError::StageFailed {
            stage,
            attempts: MAX_STAGE_ATTEMPTS,
            reason: "exhausted retries".into(),
        }))
    }
}
