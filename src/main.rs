mod adapters;
mod application;
mod config;
mod domain;
mod interface;
mod ports;

use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adapters::{DockerAdapter, DockerSettings, Exposition};
use application::Poller;
use config::Config;
use interface::http::create_router;

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("dockhealth={},tower_http=info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("🚀 Starting dockhealth v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    let exposition = Arc::new(Exposition::new()?);

    // Bind first: an unusable address is the one fatal startup fault
    let listener = tokio::net::TcpListener::bind(config.listen_addr()).await.map_err(|e| {
        error!(bind_addr = %config.bind_addr, port = config.port, error = %e, "Cannot bind metrics listener");
        e
    })?;
    let addr = listener.local_addr()?;

    let hostname = adapters::host::hostname();
    info!(%hostname, "Reporting as host");

    let docker = Arc::new(DockerAdapter::new(DockerSettings {
        docker_host: config.docker_host.clone(),
        xdg_runtime_dir: config.xdg_runtime_dir.clone(),
        request_timeout: config.request_timeout(),
        hostname,
    }));

    if let Err(e) = docker.connect().await {
        warn!("⚠ {}. Will keep retrying in the poll loop.", e);
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let poller = Poller::new(docker, exposition.clone(), config.scrape_interval);
    let poll_task = tokio::spawn(poller.run(shutdown_tx.subscribe()));

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(());
    });

    let app = create_router(exposition);
    info!("✓ Exporter listening on http://{}/metrics", addr);

    let mut server_shutdown = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.recv().await;
        })
        .await?;

    if let Err(e) = poll_task.await {
        warn!(error = %e, "Poll loop ended abnormally");
    }

    info!("Exporter stopped");
    Ok(())
}
