//! API server entry point.

use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration and tracing
    let config = api::Config::from_env();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Wire stores, services, orchestrator, and workers
    let runtime = api::create_state(&config).await?;

    // 4. Background workers with a shared shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper_handle = tokio::spawn(runtime.reaper.run(shutdown_rx.clone()));
    let recovery_handle = tokio::spawn(runtime.recovery.run(shutdown_rx));

    // 5. Serve
    let app = api::create_app(runtime.state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting booking API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. Stop the workers and drain
    let _ = shutdown_tx.send(true);
    let _ = reaper_handle.await;
    let _ = recovery_handle.await;

    tracing::info!("server shut down gracefully");
    Ok(())
}
