//! Individual stage execution: invoke the stage function and merge its
//! result fields back onto the document record.

use std::collections::HashMap;
use std::str::FromStr;

use serde_json::{json, Value};

use super::llm::LlmClient;
use super::prompts::stage_prompt;
use super::PipelineError;
use crate::models::enums::{DocumentStatus, PipelineStage, TamperingRisk};
use crate::models::{Anomaly, Document};

/// The fixed processing order. Preservation and finalize run locally;
/// everything in between delegates to the LLM.
pub const STAGE_SEQUENCE: [PipelineStage; 8] = [
    PipelineStage::Preservation,
    PipelineStage::Enhancement,
    PipelineStage::Layout,
    PipelineStage::Semantic,
    PipelineStage::Confidence,
    PipelineStage::TrustScore,
    PipelineStage::Verification,
    PipelineStage::Finalize,
];

/// Run one stage against the in-memory document. Returns the stage's result
/// payload for the completion report.
pub fn run_stage(
    stage: PipelineStage,
    document: &mut Document,
    llm: &dyn LlmClient,
    model: &str,
) -> Result<Value, PipelineError> {
    match stage_prompt(stage, document) {
        Some((prompt, schema)) => {
            let result = llm.extract(model, &prompt, &schema)?;
            merge_stage_result(stage, document, &result)?;
            Ok(result)
        }
        None => run_local_stage(stage, document, llm),
    }
}

fn run_local_stage(
    stage: PipelineStage,
    document: &mut Document,
    llm: &dyn LlmClient,
) -> Result<Value, PipelineError> {
    match stage {
        PipelineStage::Preservation => {
            document.status = DocumentStatus::Processing;
            Ok(json!({ "preserved": true }))
        }
        PipelineStage::Verification => {
            let available = llm.is_available();
            if !available {
                tracing::warn!(
                    document_id = %document.id,
                    "External verification unavailable, continuing without it"
                );
            }
            Ok(json!({ "verification_available": available }))
        }
        PipelineStage::Finalize => {
            document.status = DocumentStatus::Completed;
            let elapsed = chrono::Local::now().naive_local() - document.created_at;
            document.processing_time_ms = Some(elapsed.num_milliseconds().max(0));
            Ok(json!({ "status": "completed" }))
        }
        _ => unreachable!("stage {} has a prompt", stage.as_str()),
    }
}

fn merge_stage_result(
    stage: PipelineStage,
    document: &mut Document,
    result: &Value,
) -> Result<(), PipelineError> {
    match stage {
        PipelineStage::Enhancement => {
            document.confidence = Some(require_f64(result, "confidence")? as f32);
        }
        PipelineStage::Layout => {
            document.document_class = Some(require_str(result, "document_class")?.to_lowercase());
        }
        PipelineStage::Semantic => {
            let fields: HashMap<String, String> =
                serde_json::from_value(result["key_data_points"].clone()).map_err(|e| {
                    PipelineError::ResponseParsing(format!("key_data_points: {e}"))
                })?;
            document.key_data_points.extend(fields);
            document.summary = Some(require_str(result, "summary")?);
        }
        PipelineStage::Confidence => {
            let anomalies: Vec<Anomaly> = serde_json::from_value(result["anomalies"].clone())
                .map_err(|e| PipelineError::ResponseParsing(format!("anomalies: {e}")))?;
            document.anomalies = anomalies;
            let risk = require_str(result, "tampering_risk")?;
            document.tampering_risk = Some(TamperingRisk::from_str(&risk).map_err(|_| {
                PipelineError::ResponseParsing(format!("unknown tampering_risk '{risk}'"))
            })?);
        }
        PipelineStage::TrustScore => {
            document.trust_score = Some(require_f64(result, "trust_score")? as f32);
        }
        PipelineStage::Preservation | PipelineStage::Verification | PipelineStage::Finalize => {}
    }
    Ok(())
}

fn require_str(result: &Value, field: &str) -> Result<String, PipelineError> {
    result[field]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| PipelineError::ResponseParsing(format!("missing string field '{field}'")))
}

fn require_f64(result: &Value, field: &str) -> Result<f64, PipelineError> {
    result[field]
        .as_f64()
        .ok_or_else(|| PipelineError::ResponseParsing(format!("missing numeric field '{field}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::MockLlmClient;

    #[test]
    fn stage_sequence_starts_and_ends_locally() {
        assert_eq!(STAGE_SEQUENCE[0], PipelineStage::Preservation);
        assert_eq!(STAGE_SEQUENCE[7], PipelineStage::Finalize);
    }

    #[test]
    fn preservation_moves_document_into_processing() {
        let mut doc = Document::new("Test");
        let llm = MockLlmClient::new();
        run_stage(PipelineStage::Preservation, &mut doc, &llm, "m").unwrap();
        assert_eq!(doc.status, DocumentStatus::Processing);
    }

    #[test]
    fn layout_sets_lowercased_class() {
        let mut doc = Document::new("Test");
        let llm = MockLlmClient::with_responses(vec![json!({"document_class": "Invoice"})]);
        run_stage(PipelineStage::Layout, &mut doc, &llm, "m").unwrap();
        assert_eq!(doc.document_class.as_deref(), Some("invoice"));
    }

    #[test]
    fn semantic_merges_fields_and_summary() {
        let mut doc = Document::new("Test");
        doc.key_data_points.insert("existing".into(), "kept".into());
        let llm = MockLlmClient::with_responses(vec![json!({
            "key_data_points": { "total": "125.00", "due_date": "2026-09-15" },
            "summary": "An invoice for services."
        })]);
        run_stage(PipelineStage::Semantic, &mut doc, &llm, "m").unwrap();
        assert_eq!(doc.key_data_points.len(), 3);
        assert_eq!(doc.field_value("total"), Some("125.00"));
        assert_eq!(doc.summary.as_deref(), Some("An invoice for services."));
    }

    #[test]
    fn confidence_rejects_unknown_tampering_risk() {
        let mut doc = Document::new("Test");
        let llm = MockLlmClient::with_responses(vec![json!({
            "anomalies": [],
            "tampering_risk": "catastrophic"
        })]);
        let result = run_stage(PipelineStage::Confidence, &mut doc, &llm, "m");
        assert!(matches!(result, Err(PipelineError::ResponseParsing(_))));
    }

    #[test]
    fn confidence_stores_anomalies() {
        let mut doc = Document::new("Test");
        let llm = MockLlmClient::with_responses(vec![json!({
            "anomalies": [
                {"anomaly_type": "date_mismatch", "description": "d", "severity": "high"}
            ],
            "tampering_risk": "medium"
        })]);
        run_stage(PipelineStage::Confidence, &mut doc, &llm, "m").unwrap();
        assert_eq!(doc.anomalies.len(), 1);
        assert_eq!(doc.tampering_risk, Some(TamperingRisk::Medium));
    }

    #[test]
    fn finalize_completes_and_stamps_duration() {
        let mut doc = Document::new("Test");
        doc.created_at = chrono::Local::now().naive_local() - chrono::Duration::seconds(2);
        let llm = MockLlmClient::new();
        run_stage(PipelineStage::Finalize, &mut doc, &llm, "m").unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert!(doc.processing_time_ms.unwrap() >= 2000);
    }

    #[test]
    fn verification_reports_availability_without_failing() {
        let mut doc = Document::new("Test");
        let llm = MockLlmClient::new().unavailable();
        let result = run_stage(PipelineStage::Verification, &mut doc, &llm, "m").unwrap();
        assert_eq!(result["verification_available"], false);
    }

    #[test]
    fn missing_response_field_is_a_parse_error() {
        let mut doc = Document::new("Test");
        let llm = MockLlmClient::with_responses(vec![json!({"unrelated": 1})]);
        let result = run_stage(PipelineStage::Enhancement, &mut doc, &llm, "m");
        assert!(matches!(result, Err(PipelineError::ResponseParsing(_))));
    }
}
