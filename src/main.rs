use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use grocer_dispatch::mailer::LogMailer;
use grocer_dispatch::notify::HttpNotifier;
use grocer_dispatch::{api, config, error, state};

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let notifier = Arc::new(HttpNotifier::new(&config.relay_url));
    let mailer = Arc::new(LogMailer);
    let shared_state = Arc::new(state::AppState::new(
        config.delivery_radius_km,
        notifier,
        mailer,
    ));

    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "service started");

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
