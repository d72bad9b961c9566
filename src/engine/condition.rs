//! Condition evaluation — pure functions testing one rule against one
//! document's extracted data. Date-based triggers never fire on unparseable
//! values, but the caller is told the value was malformed so the run report
//! can surface it.

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::enums::TriggerType;
use crate::models::{Document, TriggerRule};

const DEFAULT_APPROACHING_DAYS: i64 = 30;
const DEFAULT_PASSED_DAYS: i64 = 0;

/// Date formats accepted in key_data_points values, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%b %d, %Y", "%B %d, %Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOutcome {
    Met,
    NotMet,
    /// A date-based trigger saw a non-empty value it could not parse.
    MalformedDate,
}

/// Evaluate a rule against a document relative to an explicit "today"
/// (injected so date-window tests are deterministic).
pub fn evaluate_on(rule: &TriggerRule, document: &Document, today: NaiveDate) -> ConditionOutcome {
    let value = document
        .field_value(&rule.trigger_field)
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match rule.trigger_type {
        TriggerType::FieldPresent => bool_outcome(value.is_some()),
        TriggerType::FieldMissing => bool_outcome(value.is_none()),
        TriggerType::ValueMatches => {
            let needle = rule.match_value.as_deref().map(str::trim).unwrap_or("");
            match value {
                Some(v) if !needle.is_empty() => {
                    bool_outcome(v.to_lowercase().contains(&needle.to_lowercase()))
                }
                _ => ConditionOutcome::NotMet,
            }
        }
        TriggerType::DateApproaching => match value.map(parse_field_date) {
            Some(Some(date)) => {
                let threshold = rule.days_threshold.unwrap_or(DEFAULT_APPROACHING_DAYS);
                let days = days_between(today, date);
                bool_outcome(days >= 0 && days <= threshold)
            }
            Some(None) => ConditionOutcome::MalformedDate,
            None => ConditionOutcome::NotMet,
        },
        TriggerType::DatePassed => match value.map(parse_field_date) {
            Some(Some(date)) => {
                let threshold = rule.days_threshold.unwrap_or(DEFAULT_PASSED_DAYS);
                bool_outcome(days_between(today, date) < -threshold)
            }
            Some(None) => ConditionOutcome::MalformedDate,
            None => ConditionOutcome::NotMet,
        },
    }
}

fn bool_outcome(met: bool) -> ConditionOutcome {
    if met {
        ConditionOutcome::Met
    } else {
        ConditionOutcome::NotMet
    }
}

/// Signed whole days from `today` to `date`; negative when in the past.
pub fn days_between(today: NaiveDate, date: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Parse an extracted field value as a calendar date. Datetime strings are
/// accepted by taking their date component.
pub fn parse_field_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }
    None
}

/// Human-readable distance clause for notification text:
/// "5 days away", "today", "3 days ago".
pub fn describe_distance(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "1 day away".to_string(),
        -1 => "1 day ago".to_string(),
        d if d > 0 => format!("{d} days away"),
        d => format!("{} days ago", -d),
    }
}
