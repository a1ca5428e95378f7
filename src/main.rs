use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use adherex::api::{api_router, ApiContext};
use adherex::assistant::GeminiClient;
use adherex::notify::Mailer;
use adherex::{config, db};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let data_dir = config::app_data_dir();
    std::fs::create_dir_all(&data_dir).expect("Failed to create data directory");

    let db_path = config::database_path();
    let conn = db::open_database(&db_path).expect("Failed to open database");
    tracing::info!(path = %db_path.display(), "database ready");

    let assistant = match GeminiClient::from_env() {
        Ok(Some(client)) => {
            tracing::info!("assistant enabled");
            Some(Arc::new(client) as Arc<dyn adherex::assistant::LlmGenerate>)
        }
        Ok(None) => {
            tracing::info!("GEMINI_API_KEY not set, assistant disabled");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "assistant unavailable");
            None
        }
    };

    let mailer = match Mailer::from_env() {
        Ok(Some(mailer)) => {
            tracing::info!("email notifications enabled");
            Some(Arc::new(mailer))
        }
        Ok(None) => {
            tracing::info!("MAIL_HOST not set, email notifications disabled");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "mailer unavailable");
            None
        }
    };

    let ctx = ApiContext::new(conn, assistant, mailer);
    let router = api_router(ctx);

    let addr = config::bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind API address");
    tracing::info!(%addr, "listening");

    axum::serve(listener, router)
        .await
        .expect("API server error");
}
