//! Action execution for fired rules, plus the outbound-mail seam.
//!
//! Actions mutate the document in memory; the trigger engine persists the
//! mutated record together with the audit entry and the firing counter.

use chrono::NaiveDate;
use serde::Serialize;

use super::condition::{days_between, describe_distance, parse_field_date};
use super::EngineError;
use crate::models::enums::{ActionType, DocumentStatus, TriggerType};
use crate::models::{Document, TriggerRule};

const REVIEW_TAG: &str = "needs-review";

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

/// Outbound email seam. Production sends through an HTTP relay; tests
/// capture mail in memory.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EngineError>;
}

/// Posts mail as JSON to a configured relay endpoint.
pub struct HttpMailer {
    relay_url: String,
    client: reqwest::blocking::Client,
}

impl HttpMailer {
    pub fn new(relay_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            relay_url: relay_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

impl Mailer for HttpMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EngineError> {
        let response = self
            .client
            .post(&self.relay_url)
            .json(&RelayMessage { to, subject, body })
            .send()
            .map_err(|e| EngineError::Mail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EngineError::Mail(format!("relay returned {status}: {body}")));
        }
        Ok(())
    }
}

/// Fallback when no relay is configured: logs the mail instead of sending.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), EngineError> {
        tracing::info!(to = %to, subject = %subject, "No mail relay configured, logging instead");
        Ok(())
    }
}

/// Test mailer that records every message.
#[derive(Default)]
pub struct MockMailer {
    pub sent: std::sync::Mutex<Vec<(String, String, String)>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Mailer for MockMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EngineError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Action execution
// ---------------------------------------------------------------------------

/// What an executed action actually did, for the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionEffect {
    Flagged { tag_added: bool },
    EmailSent { to: String },
    TagAdded { tag: String, added: bool },
    StatusSet { status: DocumentStatus },
    StatusUnchanged,
}

/// Apply a fired rule's action to the document relative to an explicit
/// "today" (injected so date clauses in email bodies are deterministic).
pub fn execute_action_on(
    rule: &TriggerRule,
    document: &mut Document,
    mailer: &dyn Mailer,
    today: NaiveDate,
) -> Result<ActionEffect, EngineError> {
    match rule.action_type {
        ActionType::FlagForReview => {
            let tag_added = document.add_tag(REVIEW_TAG);
            let note = match rule.action_config.get("review_note") {
                Some(note) if !note.is_empty() => note.clone(),
                _ => format!(
                    "Rule '{}' flagged this document ({}: {})",
                    rule.name,
                    rule.trigger_field,
                    document.field_value(&rule.trigger_field).unwrap_or("missing")
                ),
            };
            document.append_auto_note(&note);
            Ok(ActionEffect::Flagged { tag_added })
        }
        ActionType::SendEmail => {
            let to = rule
                .action_config
                .get("email_recipient")
                .filter(|r| !r.is_empty())
                .cloned()
                .or_else(|| document.owner_email.clone())
                .ok_or_else(|| EngineError::InvalidActionConfig {
                    rule: rule.name.clone(),
                    reason: "no email_recipient configured and document has no owner".into(),
                })?;
            let subject = rule
                .action_config
                .get("email_subject")
                .filter(|s| !s.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("[DocIntel] Rule '{}': {}", rule.name, document.title));
            let body = build_email_body(rule, document, today);
            mailer.send(&to, &subject, &body)?;
            Ok(ActionEffect::EmailSent { to })
        }
        ActionType::AddTag => {
            let tag = match rule.action_config.get("tag") {
                Some(tag) if !tag.is_empty() => tag.clone(),
                _ => rule.default_tag(),
            };
            let added = document.add_tag(&tag);
            Ok(ActionEffect::TagAdded { tag, added })
        }
        ActionType::SetStatus => match rule.action_config.get("status") {
            Some(status) => {
                let status: DocumentStatus =
                    status
                        .parse()
                        .map_err(|_| EngineError::InvalidActionConfig {
                            rule: rule.name.clone(),
                            reason: format!("unknown status '{status}'"),
                        })?;
                document.status = status;
                Ok(ActionEffect::StatusSet { status })
            }
            None => Ok(ActionEffect::StatusUnchanged),
        },
    }
}

fn build_email_body(rule: &TriggerRule, document: &Document, today: NaiveDate) -> String {
    let mut body = format!(
        "Document: {}\nClass: {}\nRule: {}",
        document.title,
        document.document_class.as_deref().unwrap_or("unclassified"),
        rule.name,
    );
    if let Some(description) = &rule.description {
        body.push_str(&format!("\n{description}"));
    }

    // Date-based triggers get a "5 days away / 3 days ago" clause computed
    // from the same arithmetic the evaluator used.
    if matches!(
        rule.trigger_type,
        TriggerType::DateApproaching | TriggerType::DatePassed
    ) {
        if let Some(date) = document
            .field_value(&rule.trigger_field)
            .and_then(parse_field_date)
        {
            let days = days_between(today, date);
            body.push_str(&format!(
                "\nThe field '{}' ({date}) is {}.",
                rule.trigger_field,
                describe_distance(days),
            ));
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Duration;
    use uuid::Uuid;

    use super::*;

    fn rule(action_type: ActionType) -> TriggerRule {
        TriggerRule {
            id: Uuid::new_v4(),
            name: "Expiring Contract".into(),
            description: Some("Contract is close to its end date".into()),
            document_class: None,
            trigger_field: "due_date".into(),
            trigger_type: TriggerType::DateApproaching,
            match_value: None,
            days_threshold: Some(7),
            action_type,
            action_config: HashMap::new(),
            enabled: true,
            times_fired: 0,
            last_fired_at: None,
            created_at: chrono::Local::now().naive_local(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 23).unwrap()
    }

    #[test]
    fn flag_for_review_tags_and_notes() {
        let r = rule(ActionType::FlagForReview);
        let mut doc = Document::new("Contract");
        doc.key_data_points.insert("due_date".into(), "2026-08-25".into());
        let mailer = MockMailer::new();

        let effect = execute_action_on(&r, &mut doc, &mailer, today()).unwrap();
        assert_eq!(effect, ActionEffect::Flagged { tag_added: true });
        assert!(doc.tags.contains(&"needs-review".to_string()));
        let notes = doc.notes.unwrap();
        assert!(notes.starts_with("[AUTO] "));
        assert!(notes.contains("Expiring Contract"));
        assert!(notes.contains("due_date"));
    }

    #[test]
    fn flag_for_review_is_idempotent_on_tags() {
        let r = rule(ActionType::FlagForReview);
        let mut doc = Document::new("Contract");
        let mailer = MockMailer::new();

        execute_action_on(&r, &mut doc, &mailer, today()).unwrap();
        let effect = execute_action_on(&r, &mut doc, &mailer, today()).unwrap();
        assert_eq!(effect, ActionEffect::Flagged { tag_added: false });
        assert_eq!(doc.tags.iter().filter(|t| *t == "needs-review").count(), 1);
    }

    #[test]
    fn flag_for_review_uses_configured_note() {
        let mut r = rule(ActionType::FlagForReview);
        r.action_config.insert("review_note".into(), "check renewal clause".into());
        let mut doc = Document::new("Contract");
        execute_action_on(&r, &mut doc, &MockMailer::new(), today()).unwrap();
        assert_eq!(doc.notes.as_deref(), Some("[AUTO] check renewal clause"));
    }

    #[test]
    fn add_tag_defaults_to_rule_name() {
        let r = rule(ActionType::AddTag);
        let mut doc = Document::new("Contract");
        let effect = execute_action_on(&r, &mut doc, &MockMailer::new(), today()).unwrap();
        assert_eq!(
            effect,
            ActionEffect::TagAdded {
                tag: "expiring-contract".into(),
                added: true
            }
        );
        assert_eq!(doc.tags, vec!["expiring-contract"]);
    }

    #[test]
    fn add_tag_does_not_duplicate() {
        let mut r = rule(ActionType::AddTag);
        r.action_config.insert("tag".into(), "urgent".into());
        let mut doc = Document::new("Contract");

        execute_action_on(&r, &mut doc, &MockMailer::new(), today()).unwrap();
        let effect = execute_action_on(&r, &mut doc, &MockMailer::new(), today()).unwrap();
        assert_eq!(
            effect,
            ActionEffect::TagAdded {
                tag: "urgent".into(),
                added: false
            }
        );
        assert_eq!(doc.tags, vec!["urgent"]);
    }

    #[test]
    fn send_email_defaults_to_document_owner() {
        let r = rule(ActionType::SendEmail);
        let mut doc = Document::new("Contract");
        doc.owner_email = Some("owner@example.com".into());
        let t = today();
        doc.key_data_points.insert(
            "due_date".into(),
            (t + Duration::days(5)).format("%Y-%m-%d").to_string(),
        );
        let mailer = MockMailer::new();

        let effect = execute_action_on(&r, &mut doc, &mailer, t).unwrap();
        assert_eq!(
            effect,
            ActionEffect::EmailSent {
                to: "owner@example.com".into()
            }
        );
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (to, subject, body) = &sent[0];
        assert_eq!(to, "owner@example.com");
        assert!(subject.contains("Expiring Contract"));
        assert!(body.contains("5 days away"));
        assert!(body.contains("Contract is close to its end date"));
    }

    #[test]
    fn send_email_without_recipient_is_an_error() {
        let r = rule(ActionType::SendEmail);
        let mut doc = Document::new("Contract");
        let mailer = MockMailer::new();
        let result = execute_action_on(&r, &mut doc, &mailer, today());
        assert!(matches!(
            result,
            Err(EngineError::InvalidActionConfig { .. })
        ));
        assert_eq!(mailer.sent_count(), 0);
    }

    #[test]
    fn set_status_overwrites_from_config() {
        let mut r = rule(ActionType::SetStatus);
        r.action_config.insert("status".into(), "analyzing".into());
        let mut doc = Document::new("Contract");
        doc.status = DocumentStatus::Completed;

        let effect = execute_action_on(&r, &mut doc, &MockMailer::new(), today()).unwrap();
        assert_eq!(
            effect,
            ActionEffect::StatusSet {
                status: DocumentStatus::Analyzing
            }
        );
        assert_eq!(doc.status, DocumentStatus::Analyzing);
    }

    #[test]
    fn set_status_rejects_unknown_status() {
        let mut r = rule(ActionType::SetStatus);
        r.action_config.insert("status".into(), "archived".into());
        let mut doc = Document::new("Contract");
        let result = execute_action_on(&r, &mut doc, &MockMailer::new(), today());
        assert!(matches!(
            result,
            Err(EngineError::InvalidActionConfig { .. })
        ));
    }

    #[test]
    fn set_status_without_config_leaves_status_alone() {
        let r = rule(ActionType::SetStatus);
        let mut doc = Document::new("Contract");
        let effect = execute_action_on(&r, &mut doc, &MockMailer::new(), today()).unwrap();
        assert_eq!(effect, ActionEffect::StatusUnchanged);
        assert_eq!(doc.status, DocumentStatus::Uploaded);
    }

    #[test]
    fn email_body_includes_days_ago_for_passed_dates() {
        let mut r = rule(ActionType::SendEmail);
        r.trigger_type = TriggerType::DatePassed;
        let mut doc = Document::new("Invoice");
        doc.owner_email = Some("owner@example.com".into());
        let t = today();
        doc.key_data_points.insert(
            "due_date".into(),
            (t - Duration::days(3)).format("%Y-%m-%d").to_string(),
        );
        let mailer = MockMailer::new();
        execute_action_on(&r, &mut doc, &mailer, t).unwrap();
        let sent = mailer.sent.lock().unwrap();
        assert!(sent[0].2.contains("3 days ago"));
    }
}
