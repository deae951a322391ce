mod api;
mod bot;
mod config;
mod engine;
mod error;
mod models;
mod observability;
mod region;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::bot::client::{BotApi, TelegramBot};

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    if config.bot_token.is_empty() {
        tracing::warn!("BOT_TOKEN is not set; outbound telegram calls will fail");
    }

    let (app_state, job_rx) = state::AppState::new(config.clone());
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone());

    // the one dispatch loop this process runs; it owns the bot client
    let telegram: Arc<dyn BotApi> = Arc::new(TelegramBot::new(&config));
    tokio::spawn(engine::dispatch::run_dispatch_loop(
        shared_state.clone(),
        telegram,
        job_rx,
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
