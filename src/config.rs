use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "DocIntel";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory (~/DocIntel on all platforms)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("DocIntel")
}

/// Get the SQLite database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("docintel.db")
}

/// Default tracing filter when RUST_LOG is unset
pub fn default_log_filter() -> &'static str {
    "docintel=info,tower_http=warn"
}

/// Runtime settings, resolved from the environment with sensible defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the HTTP API binds to.
    pub bind_addr: String,
    /// Base URL of the Ollama instance backing the pipeline stages.
    pub ollama_url: String,
    /// Model name passed to every stage invocation.
    pub ollama_model: String,
    /// Per-request timeout for LLM calls, in seconds.
    pub llm_timeout_secs: u64,
    /// Optional HTTP relay endpoint for outbound email. When unset,
    /// outbound mail is logged instead of sent.
    pub mail_relay_url: Option<String>,
    /// Bearer token accepted by the API. When unset, a random token is
    /// generated at startup and printed once.
    pub api_token: Option<String>,
    /// Identity recorded in audit entries for API-initiated actions.
    pub operator_email: String,
    /// Audit entries older than this are eligible for pruning.
    pub audit_retention_days: i64,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("DOCINTEL_BIND", "127.0.0.1:8787"),
            ollama_url: env_or("DOCINTEL_OLLAMA_URL", "http://localhost:11434"),
            ollama_model: env_or("DOCINTEL_MODEL", "llama3.1:8b"),
            llm_timeout_secs: std::env::var("DOCINTEL_LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            mail_relay_url: std::env::var("DOCINTEL_MAIL_RELAY").ok(),
            api_token: std::env::var("DOCINTEL_API_TOKEN").ok(),
            operator_email: env_or("DOCINTEL_OPERATOR_EMAIL", "operator@docintel.local"),
            audit_retention_days: std::env::var("DOCINTEL_AUDIT_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(90),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("DocIntel"));
    }

    #[test]
    fn database_path_under_app_data() {
        let db = database_path();
        assert!(db.starts_with(app_data_dir()));
    }

    #[test]
    fn settings_defaults() {
        let settings = Settings::from_env();
        assert!(!settings.bind_addr.is_empty());
        assert!(settings.ollama_url.starts_with("http"));
        assert!(settings.llm_timeout_secs > 0);
        assert!(settings.audit_retention_days > 0);
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
