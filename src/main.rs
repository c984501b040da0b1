use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use tracing::info;

mod clipboard;
mod config;
mod llm;
mod session;
mod state;
mod utils;
mod web;

use clipboard::SystemClipboard;
use config::{env_log_level, CONFIG};
use llm::GeminiAnalyzer;
use state::AppState;
use utils::logging::init_logging;

type MainResult = Result<(), Box<dyn Error + Send + Sync>>;

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> MainResult {
    dotenv().ok();
    let _guards = init_logging(&env_log_level());

    info!(
        "Starting ChromaRestore (model={}, listen={})",
        CONFIG.gemini_model, CONFIG.listen_addr
    );

    let analyzer = Arc::new(GeminiAnalyzer::from_config(&CONFIG));
    let state = AppState::new(
        analyzer,
        Arc::new(SystemClipboard::new()),
        &CONFIG.analysis_error_message,
        Duration::from_millis(CONFIG.copy_ack_millis),
    );

    let app = web::router(state, CONFIG.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(CONFIG.listen_addr).await?;
    info!("Open http://{} in a browser", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
