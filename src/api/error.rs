//! API error types with JSON response bodies.
//!
//! Validation problems return `{error}` with 400, unknown ids `{error}`
//! with 404, and unexpected failures `{error, details}` with 500. Unmet
//! engine preconditions are not errors and never pass through here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::DatabaseError;
use crate::engine::EngineError;
use crate::workflow::WorkflowError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("{error}: {details}")]
    Internal { error: String, details: String },
}

impl ApiError {
    pub fn internal(error: &str, details: impl ToString) -> Self {
        Self::Internal {
            error: error.to_string(),
            details: details.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": message })),
            )
                .into_response(),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": message })),
            )
                .into_response(),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Authentication required" })),
            )
                .into_response(),
            ApiError::Internal { error, details } => {
                tracing::error!(error = %error, details = %details, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": error, "details": details })),
                )
                    .into_response()
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} {id} not found"))
            }
            DatabaseError::InvalidEnum { field, value } => {
                ApiError::BadRequest(format!("invalid value '{value}' for {field}"))
            }
            DatabaseError::ConstraintViolation(message) => {
                ApiError::BadRequest(format!("constraint violated: {message}"))
            }
            other => ApiError::internal("Database error", other),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Database(e) => e.into(),
            EngineError::InvalidActionConfig { .. } => ApiError::BadRequest(err.to_string()),
            other => ApiError::internal("Engine error", other),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Database(e) => e.into(),
            WorkflowError::Engine(e) => e.into(),
            WorkflowError::Disabled(_) | WorkflowError::NotRunning(_) => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::internal("Workflow error", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn bad_request_shape() {
        let response = ApiError::BadRequest("document_id is required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "document_id is required");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn internal_error_includes_details() {
        let response = ApiError::internal("Engine error", "boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Engine error");
        assert_eq!(json["details"], "boom");
    }

    #[tokio::test]
    async fn database_not_found_maps_to_404() {
        let err: ApiError = DatabaseError::NotFound {
            entity_type: "document".into(),
            id: "abc".into(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_enum_maps_to_400() {
        let err: ApiError = DatabaseError::InvalidEnum {
            field: "ActionType".into(),
            value: "archive".into(),
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn constraint_violation_maps_to_400() {
        let err: ApiError =
            DatabaseError::ConstraintViolation("FOREIGN KEY constraint failed".into()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn disabled_workflow_maps_to_400() {
        let err: ApiError = WorkflowError::Disabled("intake".into()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
