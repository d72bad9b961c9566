pub mod enums;

pub use enums::*;

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An anomaly recorded against a document by the validation stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anomaly {
    pub anomaly_type: String,
    pub description: String,
    pub severity: String,
}

/// A processed file record. Mutated by the pipeline stages and by rule
/// actions; the trigger engine only evaluates documents with
/// `status == Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub owner_email: Option<String>,
    pub document_class: Option<String>,
    pub file_type: Option<String>,
    pub status: DocumentStatus,
    pub pipeline_stage: Option<PipelineStage>,
    /// Flat map of extracted field values (dates, amounts, names).
    pub key_data_points: HashMap<String, String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub summary: Option<String>,
    pub anomalies: Vec<Anomaly>,
    pub tampering_risk: Option<TamperingRisk>,
    pub confidence: Option<f32>,
    pub trust_score: Option<f32>,
    pub processing_time_ms: Option<i64>,
    pub created_at: NaiveDateTime,
}

impl Document {
    /// Minimal record in `uploaded` state; everything else defaults empty.
    pub fn new(title: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            owner_email: None,
            document_class: None,
            file_type: None,
            status: DocumentStatus::Uploaded,
            pipeline_stage: None,
            key_data_points: HashMap::new(),
            tags: Vec::new(),
            notes: None,
            summary: None,
            anomalies: Vec::new(),
            tampering_risk: None,
            confidence: None,
            trust_score: None,
            processing_time_ms: None,
            created_at: chrono::Local::now().naive_local(),
        }
    }

    /// Field lookup is single-level; no nested path support.
    pub fn field_value(&self, field: &str) -> Option<&str> {
        self.key_data_points.get(field).map(|v| v.as_str())
    }

    /// Add a tag only if not already present (idempotent).
    /// Returns true when the tag was newly added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Append a note line, prefixed with `[AUTO] ` to mark rule-generated text.
    pub fn append_auto_note(&mut self, note: &str) {
        let line = format!("[AUTO] {note}");
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{line}"),
            _ => line,
        });
    }
}

// ---------------------------------------------------------------------------
// TriggerRule
// ---------------------------------------------------------------------------

/// A user-authored automation rule: one trigger condition paired with one
/// action. The engine only mutates `times_fired` and `last_fired_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRule {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// When set, the rule only applies to documents of this class
    /// (compared case-insensitively).
    pub document_class: Option<String>,
    /// Field name looked up in the document's key_data_points.
    pub trigger_field: String,
    pub trigger_type: TriggerType,
    pub match_value: Option<String>,
    /// Day window for date_approaching (default 30) / date_passed (default 0).
    pub days_threshold: Option<i64>,
    pub action_type: ActionType,
    pub action_config: HashMap<String, String>,
    /// Required boolean — there is no ambiguous absent state.
    pub enabled: bool,
    pub times_fired: i64,
    pub last_fired_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl TriggerRule {
    /// Default tag applied by `add_tag` actions with no explicit tag:
    /// the rule name, lower-cased and hyphenated.
    pub fn default_tag(&self) -> String {
        self.name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
    }
}

// ---------------------------------------------------------------------------
// WorkflowLearning
// ---------------------------------------------------------------------------

/// A per-category running-statistics record keyed by
/// `(learning_type, pattern_key)`. Created on first observation of a key,
/// updated incrementally thereafter, never deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowLearning {
    pub id: Uuid,
    pub learning_type: LearningType,
    pub pattern_key: String,
    pub sample_count: i64,
    pub success_count: i64,
    pub avg_processing_ms: f64,
    pub avg_anomaly_count: f64,
    /// Grows with sample count for routing patterns; capped at 99.
    pub confidence_score: i64,
    /// Extracted-field name → occurrence count across samples.
    pub field_frequencies: HashMap<String, i64>,
    /// Anomaly type → occurrence count across samples.
    pub anomaly_frequencies: HashMap<String, i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ---------------------------------------------------------------------------
// AuditEntry
// ---------------------------------------------------------------------------

/// Append-only audit record. Written once per rule firing and once per
/// workflow-execution control action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub user_email: String,
    pub timestamp: NaiveDateTime,
    pub changes: serde_json::Value,
}

impl AuditEntry {
    pub fn new(
        entity_type: &str,
        entity_id: &str,
        action: &str,
        user_email: &str,
        changes: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            action: action.to_string(),
            user_email: user_email.to_string(),
            timestamp: chrono::Local::now().naive_local(),
            changes,
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow & WorkflowExecution
// ---------------------------------------------------------------------------

/// One step of a multi-step workflow. Step types form a closed set
/// composing the core engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    pub step_type: WorkflowStepType,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
    pub enabled: bool,
    pub created_at: NaiveDateTime,
}

/// Per-step outcome within one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub status: StepStatus,
    pub result: Option<serde_json::Value>,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

/// A single run of a workflow against one document. Created at run start,
/// mutated step-by-step, finalized at completion, failure or cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub document_id: Uuid,
    pub status: ExecutionStatus,
    pub current_step: Option<String>,
    pub steps_completed: Vec<StepRecord>,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
}

impl WorkflowExecution {
    pub fn start(workflow_id: Uuid, document_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            document_id,
            status: ExecutionStatus::Running,
            current_step: None,
            steps_completed: Vec::new(),
            duration_ms: None,
            error: None,
            started_at: chrono::Local::now().naive_local(),
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_tag_is_idempotent() {
        let mut doc = Document::new("Invoice");
        assert!(doc.add_tag("needs-review"));
        assert!(!doc.add_tag("needs-review"));
        assert_eq!(doc.tags, vec!["needs-review"]);
    }

    #[test]
    fn append_auto_note_prefixes_and_chains() {
        let mut doc = Document::new("Invoice");
        doc.append_auto_note("first");
        doc.append_auto_note("second");
        assert_eq!(doc.notes.as_deref(), Some("[AUTO] first\n[AUTO] second"));
    }

    #[test]
    fn append_auto_note_preserves_existing_notes() {
        let mut doc = Document::new("Invoice");
        doc.notes = Some("manual note".into());
        doc.append_auto_note("flagged");
        assert_eq!(doc.notes.as_deref(), Some("manual note\n[AUTO] flagged"));
    }

    #[test]
    fn default_tag_is_hyphenated_lowercase() {
        let mut rule = test_rule();
        rule.name = "Expiring  Contract Alert".into();
        assert_eq!(rule.default_tag(), "expiring-contract-alert");
    }

    #[test]
    fn field_value_is_single_level() {
        let mut doc = Document::new("Invoice");
        doc.key_data_points.insert("due_date".into(), "2026-09-01".into());
        assert_eq!(doc.field_value("due_date"), Some("2026-09-01"));
        assert_eq!(doc.field_value("nested.path"), None);
    }

    fn test_rule() -> TriggerRule {
        TriggerRule {
            id: Uuid::new_v4(),
            name: "Test".into(),
            description: None,
            document_class: None,
            trigger_field: "due_date".into(),
            trigger_type: TriggerType::FieldPresent,
            match_value: None,
            days_threshold: None,
            action_type: ActionType::AddTag,
            action_config: HashMap::new(),
            enabled: true,
            times_fired: 0,
            last_fired_at: None,
            created_at: chrono::Local::now().naive_local(),
        }
    }
}
