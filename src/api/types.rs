//! Shared API state and authentication primitives.

use std::sync::{Arc, Mutex};

use base64::Engine;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::engine::Mailer;
use crate::pipeline::LlmClient;

/// Shared state for handlers (via `State`) and middleware (via `Extension`).
#[derive(Clone)]
pub struct ApiContext {
    pub db: Arc<Mutex<Connection>>,
    pub llm: Arc<dyn LlmClient>,
    pub mailer: Arc<dyn Mailer>,
    pub model: String,
    /// SHA-256 hash of the accepted bearer token. `None` disables auth
    /// (local development).
    pub token_hash: Option<String>,
    /// Email attributed to API-initiated mutations in the audit log.
    pub operator_email: String,
}

impl ApiContext {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        llm: Arc<dyn LlmClient>,
        mailer: Arc<dyn Mailer>,
        model: String,
        token_hash: Option<String>,
        operator_email: String,
    ) -> Self {
        Self {
            db,
            llm,
            mailer,
            model,
            token_hash,
            operator_email,
        }
    }
}

/// Caller identity resolved by the auth middleware.
#[derive(Clone, Debug)]
pub struct Identity {
    pub email: String,
}

/// Generate a random URL-safe API token.
pub fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Tokens are stored and compared as SHA-256 hashes, never in the clear.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(digest)
}
