use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gitdigest::app::build_router;
use gitdigest::db::ApiLogStore;
use gitdigest::db::postgres::PostgresLogStore;
use gitdigest::logging::init_logging;
use gitdigest::server::{AppState, ServerConfig};
use gitdigest::utils::colors::{Tone, paint};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::parse();
    init_logging(config.log_format)?;
    config.validate()?;

    let bind_addr = config.bind_addr()?;
    let tmp_base_path = config.tmp_base_path();
    tokio::fs::create_dir_all(&tmp_base_path)
        .await
        .with_context(|| format!("failed to create {}", tmp_base_path.display()))?;

    let log_store = PostgresLogStore::connect_lazy(
        &config.database_url,
        config.max_connections,
        config.db_acquire_timeout(),
    )
    .context("invalid database configuration")?;
    if let Err(err) = log_store.init_schema().await {
        warn!(stage = "startup", event = "db.init", error = %err, "request log table unavailable");
        eprintln!(
            "{} {}",
            paint("warning:", Tone::Yellow),
            paint("request log database unavailable, requests will not be recorded", Tone::Faint)
        );
    }

    let state = AppState::new(&config, Arc::new(config.ingestor()), Arc::new(log_store))?;
    let app = build_router(state, &config.static_dir);

    let sweeper = config.sweeper().spawn(CancellationToken::new());

    let listener = TcpListener::bind(bind_addr)
        .await
        .context("failed to bind TCP listener")?;

    eprintln!(
        "{} {}",
        paint("gitdigest", Tone::LightGreen),
        paint(&format!("listening on http://{bind_addr}"), Tone::Faint)
    );
    info!(
        stage = "startup",
        event = "server.start",
        %bind_addr,
        tmp_base_path = %tmp_base_path.display(),
        "server starting"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server shutdown")?;

    if !sweeper.shutdown(config.shutdown_timeout()).await {
        warn!(
            stage = "shutdown",
            event = "sweeper.abort",
            timeout_secs = config.shutdown_timeout,
            "retention sweeper aborted, a folder may be left partially deleted"
        );
    }
    info!(stage = "shutdown", event = "server.stop", "server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(?err, "failed to listen for CTRL+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => warn!(?err, "failed to listen for TERM signal"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
