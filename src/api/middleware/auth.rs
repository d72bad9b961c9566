//! Bearer-token authentication. The accepted token's hash lives in
//! `ApiContext`; a valid request gets an `Identity` injected for audit
//! attribution downstream.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;

use crate::api::error::ApiError;
use crate::api::types::{hash_token, ApiContext, Identity};

pub async fn require_auth(
    Extension(ctx): Extension<ApiContext>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected_hash) = &ctx.token_hash {
        let presented = request
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        if &hash_token(presented) != expected_hash {
            return Err(ApiError::Unauthorized);
        }
    }

    request.extensions_mut().insert(Identity {
        email: ctx.operator_email.clone(),
    });
    Ok(next.run(request).await)
}
