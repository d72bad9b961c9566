//! Service health.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::config;

pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<Value>, ApiError> {
    // The availability probe uses a blocking HTTP client.
    let llm_available = run_blocking(move || Ok(ctx.llm.is_available())).await?;
    Ok(Json(json!({
        "status": "ok",
        "version": config::APP_VERSION,
        "llm_available": llm_available,
    })))
}
