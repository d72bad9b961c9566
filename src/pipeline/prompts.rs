//! Prompt and response-schema builders for the LLM-backed pipeline stages.
//! Preservation and finalize are local and have no prompt.

use serde_json::{json, Value};

use crate::models::enums::PipelineStage;
use crate::models::Document;

/// Prompt + JSON response schema for an LLM-backed stage; `None` for local
/// stages.
pub fn stage_prompt(stage: PipelineStage, document: &Document) -> Option<(String, Value)> {
    match stage {
        PipelineStage::Preservation | PipelineStage::Verification | PipelineStage::Finalize => {
            None
        }
        PipelineStage::Enhancement => Some((enhancement_prompt(document), enhancement_schema())),
        PipelineStage::Layout => Some((layout_prompt(document), layout_schema())),
        PipelineStage::Semantic => Some((semantic_prompt(document), semantic_schema())),
        PipelineStage::Confidence => Some((confidence_prompt(document), confidence_schema())),
        PipelineStage::TrustScore => Some((trust_score_prompt(document), trust_score_schema())),
    }
}

fn document_context(document: &Document) -> String {
    let mut context = format!("Document title: {}", document.title);
    if let Some(class) = &document.document_class {
        context.push_str(&format!("\nDocument class: {class}"));
    }
    if let Some(file_type) = &document.file_type {
        context.push_str(&format!("\nFile type: {file_type}"));
    }
    if !document.key_data_points.is_empty() {
        context.push_str("\nExtracted fields:");
        let mut fields: Vec<_> = document.key_data_points.iter().collect();
        fields.sort();
        for (name, value) in fields {
            context.push_str(&format!("\n- {name}: {value}"));
        }
    }
    if let Some(summary) = &document.summary {
        context.push_str(&format!("\nSummary: {summary}"));
    }
    context
}

fn enhancement_prompt(document: &Document) -> String {
    format!(
        "Assess the OCR read quality of the following document. Return a \
         confidence value between 0 and 1 reflecting how reliable the \
         extracted text is.\n\n{}",
        document_context(document)
    )
}

fn enhancement_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "confidence": { "type": "number" }
        },
        "required": ["confidence"]
    })
}

fn layout_prompt(document: &Document) -> String {
    format!(
        "Classify the following document into a single lowercase class such \
         as invoice, contract, receipt, letter or report.\n\n{}",
        document_context(document)
    )
}

fn layout_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "document_class": { "type": "string" }
        },
        "required": ["document_class"]
    })
}

fn semantic_prompt(document: &Document) -> String {
    format!(
        "Extract the key data points (dates, amounts, names, terms) from the \
         following document as a flat map of field name to string value, and \
         write a one-paragraph summary.\n\n{}",
        document_context(document)
    )
}

fn semantic_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "key_data_points": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            },
            "summary": { "type": "string" }
        },
        "required": ["key_data_points", "summary"]
    })
}

fn confidence_prompt(document: &Document) -> String {
    format!(
        "Validate the following document's extracted data. List any anomalies \
         (inconsistent dates, impossible amounts, missing signatures) and \
         rate the tampering risk as low, medium or high.\n\n{}",
        document_context(document)
    )
}

fn confidence_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "anomalies": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "anomaly_type": { "type": "string" },
                        "description": { "type": "string" },
                        "severity": { "type": "string" }
                    },
                    "required": ["anomaly_type", "description", "severity"]
                }
            },
            "tampering_risk": { "type": "string", "enum": ["low", "medium", "high"] }
        },
        "required": ["anomalies", "tampering_risk"]
    })
}

fn trust_score_prompt(document: &Document) -> String {
    format!(
        "Given the document below, its anomalies and tampering risk, produce \
         an overall trust score between 0 and 100.\n\n{}\nAnomalies: {}\nTampering risk: {}",
        document_context(document),
        document.anomalies.len(),
        document
            .tampering_risk
            .map(|r| r.as_str())
            .unwrap_or("unknown"),
    )
}

fn trust_score_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "trust_score": { "type": "number" }
        },
        "required": ["trust_score"]
    })
}
