use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use docintel::api::{generate_token, hash_token, serve, ApiContext};
use docintel::config::{self, Settings};
use docintel::db::repository::prune_audit_log;
use docintel::db::sqlite::open_database;
use docintel::engine::{HttpMailer, LogMailer, Mailer};
use docintel::pipeline::{LlmClient, OllamaClient};

#[tokio::main]
async fn main() -> ExitCode {
    docintel::init_tracing();

    let settings = Settings::from_env();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    if let Err(e) = std::fs::create_dir_all(config::app_data_dir()) {
        tracing::error!("Cannot create data directory: {e}");
        return ExitCode::FAILURE;
    }

    let conn = match open_database(&config::database_path()) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Cannot open database: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Startup maintenance: drop audit entries past the retention window.
    match prune_audit_log(&conn, settings.audit_retention_days) {
        Ok(0) => {}
        Ok(pruned) => tracing::info!(pruned, "Expired audit entries removed"),
        Err(e) => tracing::warn!("Audit pruning failed: {e}"),
    }

    let llm = OllamaClient::new(
        &settings.ollama_url,
        &settings.ollama_model,
        settings.llm_timeout_secs,
    );
    if !llm.is_available() {
        tracing::warn!(
            url = %settings.ollama_url,
            "Ollama is not reachable; pipeline runs will fail until it is"
        );
    }

    let mailer: Arc<dyn Mailer> = match &settings.mail_relay_url {
        Some(relay) => Arc::new(HttpMailer::new(relay, 30)),
        None => {
            tracing::info!("No mail relay configured, email actions will be logged only");
            Arc::new(LogMailer)
        }
    };

    let token_hash = match &settings.api_token {
        Some(token) => Some(hash_token(token)),
        None => {
            let token = generate_token();
            // Printed once; only the hash is kept in memory.
            println!("API token (set DOCINTEL_API_TOKEN to make this stable): {token}");
            Some(hash_token(&token))
        }
    };

    let model = settings.ollama_model.clone();
    let ctx = ApiContext::new(
        Arc::new(Mutex::new(conn)),
        Arc::new(llm),
        mailer,
        model,
        token_hash,
        settings.operator_email.clone(),
    );

    if let Err(e) = serve(ctx, &settings.bind_addr).await {
        tracing::error!("Server exited with error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
