//! Trigger engine — loads enabled rules, evaluates each against one
//! document, and commits every firing's effects (document mutation, audit
//! entry, counter bump) in a single transaction.

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::action::{execute_action_on, ActionEffect, Mailer};
use super::condition::{evaluate_on, ConditionOutcome};
use super::EngineError;
use crate::db::repository::{
    get_document, get_enabled_rules, insert_audit_entry, record_rule_fired, update_document,
};
use crate::db::DatabaseError;
use crate::models::enums::DocumentStatus;
use crate::models::AuditEntry;

#[derive(Debug, Clone, Serialize)]
pub struct TriggeredRule {
    pub rule: String,
    pub action: String,
    pub field: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRule {
    pub rule: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerReport {
    pub rules_evaluated: usize,
    pub triggered: Vec<TriggeredRule>,
    pub skipped: Vec<SkippedRule>,
}

/// Outcome of one engine run. Unmet preconditions are not errors; upstream
/// automation invokes the engine opportunistically on every document update.
#[derive(Debug)]
pub enum RunOutcome {
    Skipped { reason: String },
    Completed(TriggerReport),
}

pub const SKIP_NOT_COMPLETED: &str = "Document not completed";
pub const SKIP_NO_DATA: &str = "No data to evaluate";

/// Evaluate all enabled rules against one document.
pub fn run_triggers(
    conn: &Connection,
    mailer: &dyn Mailer,
    actor: &str,
    document_id: &Uuid,
) -> Result<RunOutcome, EngineError> {
    run_triggers_on(conn, mailer, actor, document_id, Local::now().date_naive())
}

pub fn run_triggers_on(
    conn: &Connection,
    mailer: &dyn Mailer,
    actor: &str,
    document_id: &Uuid,
    today: NaiveDate,
) -> Result<RunOutcome, EngineError> {
    let document = get_document(conn, document_id)?.ok_or(DatabaseError::NotFound {
        entity_type: "document".into(),
        id: document_id.to_string(),
    })?;

    if document.status != DocumentStatus::Completed {
        return Ok(RunOutcome::Skipped {
            reason: SKIP_NOT_COMPLETED.into(),
        });
    }
    if document.key_data_points.is_empty() {
        return Ok(RunOutcome::Skipped {
            reason: SKIP_NO_DATA.into(),
        });
    }

    let rules = get_enabled_rules(conn)?;
    let rules_evaluated = rules.len();

    // Every rule is evaluated against the same snapshot; actions accumulate
    // on a separate working copy so later rules never see earlier firings.
    let snapshot = document.clone();
    let mut working = document;

    let mut triggered = Vec::new();
    let mut skipped = Vec::new();

    for rule in &rules {
        if let Some(class) = &rule.document_class {
            let matches = snapshot
                .document_class
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(class));
            if !matches {
                skipped.push(SkippedRule {
                    rule: rule.name.clone(),
                    reason: "class mismatch".into(),
                });
                continue;
            }
        }

        match evaluate_on(rule, &snapshot, today) {
            ConditionOutcome::Met => {
                let field_value = snapshot.field_value(&rule.trigger_field).unwrap_or("");

                let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
                let effect = execute_action_on(rule, &mut working, mailer, today)?;
                update_document(&tx, &working)?;
                insert_audit_entry(
                    &tx,
                    &AuditEntry::new(
                        "trigger_rule",
                        &rule.id.to_string(),
                        "rule_fired",
                        actor,
                        serde_json::json!({
                            "trigger_rule": rule.name,
                            "trigger_field": rule.trigger_field,
                            "field_value": field_value,
                            "action": rule.action_type.as_str(),
                        }),
                    ),
                )?;
                let fired_at = Local::now().naive_local();
                record_rule_fired(&tx, &rule.id, &fired_at)?;
                tx.commit().map_err(DatabaseError::from)?;

                tracing::info!(
                    document_id = %snapshot.id,
                    rule = %rule.name,
                    action = rule.action_type.as_str(),
                    effect = ?effect,
                    "Trigger rule fired"
                );
                triggered.push(TriggeredRule {
                    rule: rule.name.clone(),
                    action: rule.action_type.as_str().into(),
                    field: rule.trigger_field.clone(),
                });
            }
            ConditionOutcome::NotMet => {
                skipped.push(SkippedRule {
                    rule: rule.name.clone(),
                    reason: "condition not met".into(),
                });
            }
            ConditionOutcome::MalformedDate => {
                tracing::warn!(
                    document_id = %snapshot.id,
                    rule = %rule.name,
                    field = %rule.trigger_field,
                    "Date field could not be parsed, rule suppressed"
                );
                skipped.push(SkippedRule {
                    rule: rule.name.clone(),
                    reason: "malformed date".into(),
                });
            }
        }
    }

    Ok(RunOutcome::Completed(TriggerReport {
        rules_evaluated,
        triggered,
        skipped,
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Duration;

    use super::*;
    use crate::db::repository::{
        get_rule, insert_document, insert_rule, list_audit_entries, query_audit_by_entity,
    };
    use crate::db::sqlite::open_memory_database;
    use crate::engine::action::MockMailer;
    use crate::models::enums::{ActionType, TriggerType};
    use crate::models::{Document, TriggerRule};

    const ACTOR: &str = "operator@docintel.local";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 23).unwrap()
    }

    fn completed_document(conn: &Connection, fields: &[(&str, &str)]) -> Document {
        let mut doc = Document::new("Q3 Services Agreement");
        doc.document_class = Some("contract".into());
        doc.status = DocumentStatus::Completed;
        for (k, v) in fields {
            doc.key_data_points.insert(k.to_string(), v.to_string());
        }
        insert_document(conn, &doc).unwrap();
        doc
    }

    fn due_date_rule(conn: &Connection, name: &str, action_type: ActionType) -> TriggerRule {
        let rule = TriggerRule {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
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
        };
        insert_rule(conn, &rule).unwrap();
        rule
    }

    fn date_offset(days: i64) -> String {
        (today() + Duration::days(days)).format("%Y-%m-%d").to_string()
    }

    #[test]
    fn rule_fires_within_window_and_records_everything() {
        let conn = open_memory_database().unwrap();
        let doc = completed_document(&conn, &[("due_date", &date_offset(5))]);
        let rule = due_date_rule(&conn, "Due soon", ActionType::AddTag);
        let mailer = MockMailer::new();

        let outcome = run_triggers_on(&conn, &mailer, ACTOR, &doc.id, today()).unwrap();
        let report = match outcome {
            RunOutcome::Completed(r) => r,
            RunOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
        };
        assert_eq!(report.rules_evaluated, 1);
        assert_eq!(report.triggered.len(), 1);
        assert_eq!(report.triggered[0].rule, "Due soon");
        assert_eq!(report.triggered[0].field, "due_date");

        let stored = get_rule(&conn, &rule.id).unwrap().unwrap();
        assert_eq!(stored.times_fired, 1);
        assert!(stored.last_fired_at.is_some());

        let audits = query_audit_by_entity(&conn, "trigger_rule", &rule.id.to_string()).unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].action, "rule_fired");
        assert_eq!(audits[0].user_email, ACTOR);
        assert_eq!(audits[0].changes["trigger_field"], "due_date");

        let updated = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(updated.tags, vec!["due-soon"]);
    }

    #[test]
    fn rule_outside_window_does_not_fire() {
        let conn = open_memory_database().unwrap();
        let doc = completed_document(&conn, &[("due_date", &date_offset(10))]);
        let rule = due_date_rule(&conn, "Due soon", ActionType::AddTag);

        let outcome =
            run_triggers_on(&conn, &MockMailer::new(), ACTOR, &doc.id, today()).unwrap();
        let report = match outcome {
            RunOutcome::Completed(r) => r,
            RunOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
        };
        assert!(report.triggered.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, "condition not met");

        assert_eq!(get_rule(&conn, &rule.id).unwrap().unwrap().times_fired, 0);
        assert!(list_audit_entries(&conn, 10).unwrap().is_empty());
    }

    #[test]
    fn non_completed_document_is_skipped_without_mutation() {
        let conn = open_memory_database().unwrap();
        let mut doc = Document::new("In flight");
        doc.status = DocumentStatus::Processing;
        doc.key_data_points.insert("due_date".into(), date_offset(1));
        insert_document(&conn, &doc).unwrap();
        due_date_rule(&conn, "Due soon", ActionType::AddTag);

        let outcome =
            run_triggers_on(&conn, &MockMailer::new(), ACTOR, &doc.id, today()).unwrap();
        match outcome {
            RunOutcome::Skipped { reason } => assert_eq!(reason, SKIP_NOT_COMPLETED),
            RunOutcome::Completed(_) => panic!("expected skip"),
        }
        assert!(list_audit_entries(&conn, 10).unwrap().is_empty());
        assert!(get_document(&conn, &doc.id).unwrap().unwrap().tags.is_empty());
    }

    #[test]
    fn document_without_data_is_skipped() {
        let conn = open_memory_database().unwrap();
        let doc = completed_document(&conn, &[]);
        let outcome =
            run_triggers_on(&conn, &MockMailer::new(), ACTOR, &doc.id, today()).unwrap();
        match outcome {
            RunOutcome::Skipped { reason } => assert_eq!(reason, SKIP_NO_DATA),
            RunOutcome::Completed(_) => panic!("expected skip"),
        }
    }

    #[test]
    fn unknown_document_is_not_found() {
        let conn = open_memory_database().unwrap();
        let result = run_triggers_on(
            &conn,
            &MockMailer::new(),
            ACTOR,
            &Uuid::new_v4(),
            today(),
        );
        assert!(matches!(
            result,
            Err(EngineError::Database(DatabaseError::NotFound { .. }))
        ));
    }

    #[test]
    fn class_filter_is_case_insensitive() {
        let conn = open_memory_database().unwrap();
        let doc = completed_document(&conn, &[("due_date", &date_offset(3))]);

        let mut matching = due_date_rule(&conn, "Contract rule", ActionType::AddTag);
        matching.document_class = Some("Contract".into());
        crate::db::repository::update_rule(&conn, &matching).unwrap();

        let mut other = due_date_rule(&conn, "Invoice rule", ActionType::AddTag);
        other.document_class = Some("invoice".into());
        crate::db::repository::update_rule(&conn, &other).unwrap();

        let outcome =
            run_triggers_on(&conn, &MockMailer::new(), ACTOR, &doc.id, today()).unwrap();
        let report = match outcome {
            RunOutcome::Completed(r) => r,
            RunOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
        };
        assert_eq!(report.rules_evaluated, 2);
        assert_eq!(report.triggered.len(), 1);
        assert_eq!(report.triggered[0].rule, "Contract rule");
        assert_eq!(report.skipped[0].reason, "class mismatch");
    }

    #[test]
    fn two_firing_rules_are_independent() {
        let conn = open_memory_database().unwrap();
        let doc = completed_document(&conn, &[("due_date", &date_offset(2))]);
        let first = due_date_rule(&conn, "First", ActionType::AddTag);
        let second = due_date_rule(&conn, "Second", ActionType::FlagForReview);

        let outcome =
            run_triggers_on(&conn, &MockMailer::new(), ACTOR, &doc.id, today()).unwrap();
        let report = match outcome {
            RunOutcome::Completed(r) => r,
            RunOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
        };
        assert_eq!(report.triggered.len(), 2);

        assert_eq!(get_rule(&conn, &first.id).unwrap().unwrap().times_fired, 1);
        assert_eq!(get_rule(&conn, &second.id).unwrap().unwrap().times_fired, 1);
        assert_eq!(list_audit_entries(&conn, 10).unwrap().len(), 2);

        let updated = get_document(&conn, &doc.id).unwrap().unwrap();
        assert!(updated.tags.contains(&"first".to_string()));
        assert!(updated.tags.contains(&"needs-review".to_string()));
    }

    #[test]
    fn malformed_date_is_reported_not_fired() {
        let conn = open_memory_database().unwrap();
        let doc = completed_document(&conn, &[("due_date", "sometime next quarter")]);
        due_date_rule(&conn, "Due soon", ActionType::AddTag);

        let outcome =
            run_triggers_on(&conn, &MockMailer::new(), ACTOR, &doc.id, today()).unwrap();
        let report = match outcome {
            RunOutcome::Completed(r) => r,
            RunOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
        };
        assert!(report.triggered.is_empty());
        assert_eq!(report.skipped[0].reason, "malformed date");
    }

    #[test]
    fn value_match_fires_case_insensitively() {
        let conn = open_memory_database().unwrap();
        let doc = completed_document(&conn, &[("payment_terms", "Net 60 days")]);
        let rule = TriggerRule {
            id: Uuid::new_v4(),
            name: "Long terms".into(),
            description: None,
            document_class: None,
            trigger_field: "payment_terms".into(),
            trigger_type: TriggerType::ValueMatches,
            match_value: Some("net 60".into()),
            days_threshold: None,
            action_type: ActionType::AddTag,
            action_config: HashMap::new(),
            enabled: true,
            times_fired: 0,
            last_fired_at: None,
            created_at: chrono::Local::now().naive_local(),
        };
        insert_rule(&conn, &rule).unwrap();

        let outcome =
            run_triggers_on(&conn, &MockMailer::new(), ACTOR, &doc.id, today()).unwrap();
        let report = match outcome {
            RunOutcome::Completed(r) => r,
            RunOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
        };
        assert_eq!(report.triggered.len(), 1);
    }
}
