//! Repository layer — entity-scoped database operations.
//!
//! One sub-module per entity; all public functions are re-exported here.

mod audit;
mod document;
mod learning;
mod trigger_rule;
mod workflow;

use chrono::NaiveDateTime;

pub use audit::*;
pub use document::*;
pub use learning::*;
pub use trigger_rule::*;
pub use workflow::*;

pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub(crate) fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .unwrap_or_default()
}
