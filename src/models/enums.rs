use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Wire and storage representations are always the snake_case string.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(DocumentStatus {
    Uploaded => "uploaded",
    Processing => "processing",
    Analyzing => "analyzing",
    Completed => "completed",
    Failed => "failed",
});

str_enum!(TriggerType {
    FieldPresent => "field_present",
    FieldMissing => "field_missing",
    ValueMatches => "value_matches",
    DateApproaching => "date_approaching",
    DatePassed => "date_passed",
});

str_enum!(ActionType {
    FlagForReview => "flag_for_review",
    SendEmail => "send_email",
    AddTag => "add_tag",
    SetStatus => "set_status",
});

str_enum!(LearningType {
    RoutingPattern => "routing_pattern",
    FailurePattern => "failure_pattern",
    ResourcePrediction => "resource_prediction",
});

str_enum!(PipelineStage {
    Preservation => "preservation",
    Enhancement => "enhancement",
    Layout => "layout",
    Semantic => "semantic",
    Confidence => "confidence",
    TrustScore => "trust_score",
    Verification => "verification",
    Finalize => "finalize",
});

str_enum!(TamperingRisk {
    Low => "low",
    Medium => "medium",
    High => "high",
});

str_enum!(ExecutionStatus {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

str_enum!(StepStatus {
    Completed => "completed",
    Failed => "failed",
    Skipped => "skipped",
});

str_enum!(WorkflowStepType {
    RunPipeline => "run_pipeline",
    EvaluateRules => "evaluate_rules",
    Learn => "learn",
    ApplyAction => "apply_action",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn trigger_type_round_trip() {
        for (variant, s) in [
            (TriggerType::FieldPresent, "field_present"),
            (TriggerType::FieldMissing, "field_missing"),
            (TriggerType::ValueMatches, "value_matches"),
            (TriggerType::DateApproaching, "date_approaching"),
            (TriggerType::DatePassed, "date_passed"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(TriggerType::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn unknown_value_is_rejected() {
        assert!(ActionType::from_str("archive_document").is_err());
        assert!(TriggerType::from_str("").is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&PipelineStage::TrustScore).unwrap();
        assert_eq!(json, "\"trust_score\"");
        let back: PipelineStage = serde_json::from_str("\"trust_score\"").unwrap();
        assert_eq!(back, PipelineStage::TrustScore);
    }

    #[test]
    fn document_status_round_trip() {
        for s in ["uploaded", "processing", "analyzing", "completed", "failed"] {
            assert_eq!(DocumentStatus::from_str(s).unwrap().as_str(), s);
        }
    }
}
