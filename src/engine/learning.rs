//! Incremental learning aggregator. Each completed document updates up to
//! three running-statistics records; the whole observation commits in one
//! transaction so concurrent observers of the same key cannot lose updates.

use rusqlite::Connection;
use uuid::Uuid;

use super::EngineError;
use crate::db::repository::{get_document, get_learning, insert_learning, update_learning};
use crate::db::DatabaseError;
use crate::models::enums::{DocumentStatus, LearningType, TamperingRisk};
use crate::models::{Document, WorkflowLearning};

const MAX_CONFIDENCE: i64 = 99;

#[derive(Debug, PartialEq, Eq)]
pub enum ObserveOutcome {
    Skipped { reason: String },
    Observed { records_updated: usize },
}

/// Feed one completed document into the learning records.
pub fn observe(conn: &Connection, document_id: &Uuid) -> Result<ObserveOutcome, EngineError> {
    let document = get_document(conn, document_id)?.ok_or(DatabaseError::NotFound {
        entity_type: "document".into(),
        id: document_id.to_string(),
    })?;

    if document.status != DocumentStatus::Completed {
        return Ok(ObserveOutcome::Skipped {
            reason: "Document not completed".into(),
        });
    }

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let mut records_updated = 0;

    let class_key = document
        .document_class
        .as_deref()
        .map(normalize_class)
        .filter(|c| !c.is_empty());

    if let Some(class) = &class_key {
        observe_routing(&tx, &document, class)?;
        records_updated += 1;

        if has_failure_signals(&document) {
            observe_failure(&tx, &document, &format!("failure_{class}"))?;
            records_updated += 1;
        }
    }

    if let Some(file_type) = document.file_type.as_deref().filter(|f| !f.is_empty()) {
        observe_resource(&tx, &document, &file_type.to_lowercase())?;
        records_updated += 1;
    }

    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        document_id = %document.id,
        records_updated,
        "Learning observation recorded"
    );
    Ok(ObserveOutcome::Observed { records_updated })
}

fn normalize_class(class: &str) -> String {
    class.trim().to_lowercase()
}

fn has_failure_signals(document: &Document) -> bool {
    !document.anomalies.is_empty() || document.tampering_risk == Some(TamperingRisk::High)
}

fn processing_ms(document: &Document) -> f64 {
    document.processing_time_ms.unwrap_or(0) as f64
}

/// `new_avg = (old_avg * (n-1) + value) / n` with n the post-increment count.
fn incremental_mean(old_avg: f64, n: i64, value: f64) -> f64 {
    (old_avg * (n - 1) as f64 + value) / n as f64
}

fn routing_confidence(sample_count: i64) -> i64 {
    (50 + sample_count * 5).min(MAX_CONFIDENCE)
}

fn observe_routing(
    conn: &Connection,
    document: &Document,
    key: &str,
) -> Result<(), DatabaseError> {
    upsert(conn, LearningType::RoutingPattern, key, |record| {
        let n = record.sample_count;
        record.success_count += 1;
        record.avg_processing_ms =
            incremental_mean(record.avg_processing_ms, n, processing_ms(document));
        for field in document.key_data_points.keys() {
            *record.field_frequencies.entry(field.clone()).or_insert(0) += 1;
        }
        record.confidence_score = routing_confidence(n);
    })
}

fn observe_failure(
    conn: &Connection,
    document: &Document,
    key: &str,
) -> Result<(), DatabaseError> {
    // Failure records count problem samples only; success_count stays 0,
    // and success ratios come from the routing record for the same class.
    upsert(conn, LearningType::FailurePattern, key, |record| {
        let n = record.sample_count;
        record.avg_anomaly_count =
            incremental_mean(record.avg_anomaly_count, n, document.anomalies.len() as f64);
        for anomaly in &document.anomalies {
            *record
                .anomaly_frequencies
                .entry(anomaly.anomaly_type.clone())
                .or_insert(0) += 1;
        }
    })
}

fn observe_resource(
    conn: &Connection,
    document: &Document,
    key: &str,
) -> Result<(), DatabaseError> {
    upsert(conn, LearningType::ResourcePrediction, key, |record| {
        let n = record.sample_count;
        record.success_count += 1;
        record.avg_processing_ms =
            incremental_mean(record.avg_processing_ms, n, processing_ms(document));
    })
}

/// Fetch-or-create the record for `(learning_type, key)`, bump its sample
/// count, then let the caller fold in the observation.
fn upsert<F>(
    conn: &Connection,
    learning_type: LearningType,
    key: &str,
    fold: F,
) -> Result<(), DatabaseError>
where
    F: FnOnce(&mut WorkflowLearning),
{
    let now = chrono::Local::now().naive_local();
    match get_learning(conn, learning_type, key)? {
        Some(mut record) => {
            record.sample_count += 1;
            fold(&mut record);
            record.updated_at = now;
            update_learning(conn, &record)
        }
        None => {
            let mut record = WorkflowLearning {
                id: Uuid::new_v4(),
                learning_type,
                pattern_key: key.to_string(),
                sample_count: 1,
                success_count: 0,
                avg_processing_ms: 0.0,
                avg_anomaly_count: 0.0,
                confidence_score: 0,
                field_frequencies: Default::default(),
                anomaly_frequencies: Default::default(),
                created_at: now,
                updated_at: now,
            };
            fold(&mut record);
            insert_learning(conn, &record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_document;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Anomaly;

    fn completed_document(
        conn: &Connection,
        class: Option<&str>,
        file_type: Option<&str>,
        processing_ms: i64,
    ) -> Document {
        let mut doc = Document::new("Sample");
        doc.document_class = class.map(Into::into);
        doc.file_type = file_type.map(Into::into);
        doc.status = DocumentStatus::Completed;
        doc.processing_time_ms = Some(processing_ms);
        doc.key_data_points.insert("total".into(), "125.00".into());
        insert_document(conn, &doc).unwrap();
        doc
    }

    #[test]
    fn first_observation_creates_routing_and_resource_records() {
        let conn = open_memory_database().unwrap();
        let doc = completed_document(&conn, Some("Invoice"), Some("pdf"), 1200);

        let outcome = observe(&conn, &doc.id).unwrap();
        assert_eq!(outcome, ObserveOutcome::Observed { records_updated: 2 });

        let routing = get_learning(&conn, LearningType::RoutingPattern, "invoice")
            .unwrap()
            .unwrap();
        assert_eq!(routing.sample_count, 1);
        assert_eq!(routing.success_count, 1);
        assert!((routing.avg_processing_ms - 1200.0).abs() < f64::EPSILON);
        assert_eq!(routing.confidence_score, 55);
        assert_eq!(routing.field_frequencies.get("total"), Some(&1));

        let resource = get_learning(&conn, LearningType::ResourcePrediction, "pdf")
            .unwrap()
            .unwrap();
        assert_eq!(resource.sample_count, 1);
        assert!((resource.avg_processing_ms - 1200.0).abs() < f64::EPSILON);

        assert!(get_learning(&conn, LearningType::FailurePattern, "failure_invoice")
            .unwrap()
            .is_none());
    }

    #[test]
    fn second_observation_averages_incrementally() {
        let conn = open_memory_database().unwrap();
        let a = completed_document(&conn, Some("invoice"), Some("pdf"), 1000);
        let b = completed_document(&conn, Some("invoice"), Some("pdf"), 2000);

        observe(&conn, &a.id).unwrap();
        observe(&conn, &b.id).unwrap();

        let routing = get_learning(&conn, LearningType::RoutingPattern, "invoice")
            .unwrap()
            .unwrap();
        assert_eq!(routing.sample_count, 2);
        assert!((routing.avg_processing_ms - 1500.0).abs() < f64::EPSILON);
        assert_eq!(routing.confidence_score, 60);
        assert_eq!(routing.field_frequencies.get("total"), Some(&2));
    }

    #[test]
    fn confidence_caps_at_ninety_nine() {
        assert_eq!(routing_confidence(1), 55);
        assert_eq!(routing_confidence(9), 95);
        assert_eq!(routing_confidence(10), 99);
        assert_eq!(routing_confidence(500), 99);
    }

    #[test]
    fn anomalies_feed_the_failure_pattern() {
        let conn = open_memory_database().unwrap();
        let mut doc = completed_document(&conn, Some("contract"), Some("pdf"), 800);
        doc.anomalies = vec![
            Anomaly {
                anomaly_type: "date_mismatch".into(),
                description: "x".into(),
                severity: "medium".into(),
            },
            Anomaly {
                anomaly_type: "missing_signature".into(),
                description: "y".into(),
                severity: "high".into(),
            },
        ];
        crate::db::repository::update_document(&conn, &doc).unwrap();

        let outcome = observe(&conn, &doc.id).unwrap();
        assert_eq!(outcome, ObserveOutcome::Observed { records_updated: 3 });

        let failure = get_learning(&conn, LearningType::FailurePattern, "failure_contract")
            .unwrap()
            .unwrap();
        assert_eq!(failure.sample_count, 1);
        assert!((failure.avg_anomaly_count - 2.0).abs() < f64::EPSILON);
        assert_eq!(failure.anomaly_frequencies.get("date_mismatch"), Some(&1));
        assert_eq!(failure.anomaly_frequencies.get("missing_signature"), Some(&1));
    }

    #[test]
    fn high_tampering_risk_triggers_failure_branch_without_anomalies() {
        let conn = open_memory_database().unwrap();
        let mut doc = completed_document(&conn, Some("contract"), None, 800);
        doc.tampering_risk = Some(TamperingRisk::High);
        crate::db::repository::update_document(&conn, &doc).unwrap();

        let outcome = observe(&conn, &doc.id).unwrap();
        assert_eq!(outcome, ObserveOutcome::Observed { records_updated: 2 });
        assert!(get_learning(&conn, LearningType::FailurePattern, "failure_contract")
            .unwrap()
            .is_some());
    }

    #[test]
    fn class_key_is_normalized() {
        let conn = open_memory_database().unwrap();
        let a = completed_document(&conn, Some("  Invoice "), Some("pdf"), 1000);
        let b = completed_document(&conn, Some("INVOICE"), Some("pdf"), 1000);
        observe(&conn, &a.id).unwrap();
        observe(&conn, &b.id).unwrap();

        let routing = get_learning(&conn, LearningType::RoutingPattern, "invoice")
            .unwrap()
            .unwrap();
        assert_eq!(routing.sample_count, 2);
    }

    #[test]
    fn unclassified_document_still_feeds_resource_prediction() {
        let conn = open_memory_database().unwrap();
        let doc = completed_document(&conn, None, Some("png"), 400);
        let outcome = observe(&conn, &doc.id).unwrap();
        assert_eq!(outcome, ObserveOutcome::Observed { records_updated: 1 });
        assert!(get_learning(&conn, LearningType::ResourcePrediction, "png")
            .unwrap()
            .is_some());
    }

    #[test]
    fn incomplete_document_is_skipped() {
        let conn = open_memory_database().unwrap();
        let mut doc = Document::new("Pending");
        doc.status = DocumentStatus::Processing;
        insert_document(&conn, &doc).unwrap();

        let outcome = observe(&conn, &doc.id).unwrap();
        assert_eq!(
            outcome,
            ObserveOutcome::Skipped {
                reason: "Document not completed".into()
            }
        );
    }
}
