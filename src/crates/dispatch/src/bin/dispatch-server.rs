//! Dispatch server binary
//!
//! Serves `POST /api/query` and `GET /health` over the configured
//! dispatcher. Configuration comes from `DISPATCH_CONFIG` (YAML) and
//! `DISPATCH_*` environment variables; log filtering from `RUST_LOG`.

use anyhow::Context;
use dispatch::api::create_router;
use dispatch::bootstrap::build_dispatcher;
use dispatch::config::DispatchConfig;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Loading configuration");
    let config = DispatchConfig::load().context("Invalid configuration")?;

    let dispatcher = Arc::new(build_dispatcher(&config).context("Failed to build dispatcher")?);

    if !dispatcher.model_available().await {
        tracing::warn!(
            provider = %config.model.provider,
            "Model provider not reachable yet; requests will fail until it is"
        );
    }

    let eviction = Arc::clone(dispatcher.sessions()).spawn_eviction(config.eviction_interval());

    let app = create_router(Arc::clone(&dispatcher), config.server.allowed_origin.as_deref())
        .context("Failed to build router")?;

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Dispatch server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    eviction.abort();
    tracing::info!("Dispatch server shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
