//! Rule evaluation core: condition evaluator, action executor, the trigger
//! engine that orchestrates both, and the incremental learning aggregator.

pub mod action;
pub mod condition;
pub mod learning;
pub mod trigger;

pub use action::{ActionEffect, HttpMailer, LogMailer, Mailer, MockMailer};
pub use condition::ConditionOutcome;
pub use learning::{observe, ObserveOutcome};
pub use trigger::{run_triggers, RunOutcome, SkippedRule, TriggerReport, TriggeredRule};

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    #[error("Invalid action config on rule '{rule}': {reason}")]
    InvalidActionConfig { rule: String, reason: String },
}
