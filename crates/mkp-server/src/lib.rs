//! mkp-server: the long-running service surface.
//!
//! Wires the coordinator to its notification sources: the HTTP receiver,
//! the directory scanner, and the periodic re-scan scheduler. Also hosts
//! the Radarr/Sonarr original-language provider.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use mkp_av::{MkvmergeExtractor, MkvmergeRemuxer, MkvpropeditWriter, ToolRegistry};
use mkp_core::{Config, Error, ProfileSet, Result};

pub mod arr;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod routes;
pub mod scanner;
pub mod scheduler;

pub use context::AppContext;
pub use coordinator::{Coordinator, ItemRef, Outcome, ProcessOptions, ProcessRequest};
pub use scanner::{scan, ScanSummary};

/// Build a fully wired coordinator from config: archive pool, discovered
/// tools, extractor, writer, remuxer, and the optional language provider.
pub fn build_coordinator(config: &Config, profiles: ProfileSet) -> Result<Coordinator> {
    let pool = mkp_db::init_pool(&config.archive.db_path)?;
    let registry = ToolRegistry::discover(&config.tools);

    let mkvmerge = registry.require("mkvmerge")?.clone();
    let mkvpropedit = registry.require("mkvpropedit")?.clone();

    let lock_wait = std::time::Duration::from_secs(config.scan.lock_wait_secs);
    let mut coordinator = Coordinator::new(
        pool,
        profiles,
        Arc::new(MkvmergeExtractor::new(mkvmerge.clone())),
        Arc::new(MkvpropeditWriter::new(mkvpropedit)),
        lock_wait,
    )
    .with_remuxer(Arc::new(MkvmergeRemuxer::new(mkvmerge)));

    if let Some(provider) = arr::ArrLanguageProvider::from_config(&config.arrs) {
        coordinator = coordinator.with_language_provider(Arc::new(provider));
    }

    Ok(coordinator)
}

/// Run the service: HTTP receiver, worker pool, and (if enabled) the
/// re-scan scheduler. Returns when the process receives SIGINT.
pub async fn serve(config: Config) -> Result<()> {
    let profiles = ProfileSet::load(&config.profiles)?;
    let config = Arc::new(config);
    let coordinator = Arc::new(build_coordinator(&config, profiles)?);
    let cancel = CancellationToken::new();

    let (tx, rx) = mpsc::channel::<ProcessRequest>(config.server.queue_size.max(1));
    spawn_workers(
        coordinator.clone(),
        rx,
        config.server.workers,
        cancel.clone(),
    );

    if config.schedule.enabled {
        tokio::spawn(scheduler::run_scheduler(
            coordinator.clone(),
            config.clone(),
            cancel.clone(),
        ));
    }

    let ctx = AppContext {
        coordinator,
        config: config.clone(),
        queue: tx,
    };
    let app = routes::router(ctx);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Internal(format!("cannot bind {addr}: {e}")))?;
    tracing::info!(addr = %addr, "receiver listening");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        })
        .await
        .map_err(|e| Error::Internal(format!("server error: {e}")))?;

    Ok(())
}

/// Spawn N workers draining the processing queue.
fn spawn_workers(
    coordinator: Arc<Coordinator>,
    rx: mpsc::Receiver<ProcessRequest>,
    workers: usize,
    cancel: CancellationToken,
) {
    let rx = Arc::new(Mutex::new(rx));
    for _ in 0..workers.max(1) {
        let rx = rx.clone();
        let coordinator = coordinator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let req = tokio::select! {
                    req = async { rx.lock().await.recv().await } => req,
                    _ = cancel.cancelled() => break,
                };
                let Some(req) = req else { break };
                match coordinator.handle(&req).await {
                    Ok(outcome) => {
                        tracing::debug!(path = %req.path.display(), ?outcome, "request done")
                    }
                    Err(e) => {
                        tracing::error!(path = %req.path.display(), error = %e, "request failed")
                    }
                }
            }
        });
    }
}
