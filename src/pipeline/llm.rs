//! LLM client seam. Production talks to a local Ollama instance with a
//! JSON-schema response contract; tests queue canned responses.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PipelineError;

/// Structured extraction: prompt + JSON schema in, parsed JSON out.
pub trait LlmClient: Send + Sync {
    fn extract(&self, model: &str, prompt: &str, schema: &Value) -> Result<Value, PipelineError>;

    /// Reachability probe used by the verification stage and health checks.
    fn is_available(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for Ollama /api/generate. `format` carries the JSON schema
/// the model must conform to.
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    format: &'a Value,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl LlmClient for OllamaClient {
    fn extract(&self, model: &str, prompt: &str, schema: &Value) -> Result<Value, PipelineError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model,
            prompt,
            format: schema,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                PipelineError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                PipelineError::Timeout(self.timeout_secs)
            } else {
                PipelineError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PipelineError::LlmError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| PipelineError::ResponseParsing(e.to_string()))?;

        serde_json::from_str(&parsed.response)
            .map_err(|e| PipelineError::ResponseParsing(e.to_string()))
    }

    fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send() {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Test client: pops queued responses in order, optionally failing the
/// first N calls to exercise retry paths.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Value>>,
    fail_first: Mutex<u32>,
    available: bool,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fail_first: Mutex::new(0),
            available: true,
        }
    }

    pub fn with_responses(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fail_first: Mutex::new(0),
            available: true,
        }
    }

    /// Fail the next `n` extract calls with a connection error.
    pub fn fail_first(self, n: u32) -> Self {
        *self.fail_first.lock().unwrap() = n;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmClient for MockLlmClient {
    fn extract(&self, _model: &str, _prompt: &str, _schema: &Value) -> Result<Value, PipelineError> {
        let mut fail = self.fail_first.lock().unwrap();
        if *fail > 0 {
            *fail -= 1;
            return Err(PipelineError::Connection("mock".into()));
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PipelineError::ResponseParsing("mock response queue empty".into()))
    }

    fn is_available(&self) -> bool {
        self.available
    }
}
