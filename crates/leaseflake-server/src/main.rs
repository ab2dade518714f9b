mod server;

use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use leaseflake::{IdService, MemoryLeaseStore};
use server::config::{CliArgs, ServerConfig};
use server::handler::{AppState, router};
use server::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_telemetry()?;

    // Process-local: only sound because the config demands --single-instance.
    let store = Arc::new(MemoryLeaseStore::new());
    let service = Arc::new(IdService::start(config.id.clone(), store).await?);
    let lost = service.lost_token();

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config, service.worker_id());

    let app = router(AppState::new(Arc::clone(&service), config.max_batch));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(lost.clone()))
        .await?;

    // Requests have drained; stop issuance, renewal, then hand the id back.
    service.shutdown().await;

    if lost.is_cancelled() {
        bail!(
            "worker id {} was lost; exiting so a supervisor can restart with a fresh lease",
            service.worker_id()
        );
    }

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig, worker_id: u64) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting single-instance ID service on {} as worker {} with full config: {:#?}",
            config.server_addr,
            worker_id,
            config
        );
    } else {
        tracing::info!(
            "Starting single-instance ID service on {} as worker {}",
            config.server_addr,
            worker_id
        );
    }
}

async fn shutdown_signal(lost: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
        () = lost.cancelled() => {
            tracing::error!("Worker id lease lost, halting");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
