//! Periodic re-scan loop.
//!
//! Re-walks the configured roots on a fixed interval so files that arrived
//! outside the webhook path (manual imports, restores from backup) still get
//! processed. Profiles are reloaded at the start of each pass, so edits to
//! profile files take effect without a restart.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use mkp_core::{Config, ProfileSet};

use crate::coordinator::{Coordinator, ProcessOptions};
use crate::scanner;

/// Run the scheduler until the cancellation token fires.
pub async fn run_scheduler(
    coordinator: Arc<Coordinator>,
    config: Arc<Config>,
    cancel: CancellationToken,
) {
    let interval = Duration::from_secs(config.schedule.interval_secs.max(1));
    tracing::info!(interval_secs = interval.as_secs(), "scheduler started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => {
                tracing::info!("scheduler shutting down");
                break;
            }
        }

        match ProfileSet::load(&config.profiles) {
            Ok(profiles) => coordinator.set_profiles(profiles),
            Err(e) => {
                // Keep scanning with the previous profiles.
                tracing::error!(error = %e, "profile reload failed");
            }
        }

        scanner::scan(
            coordinator.clone(),
            &config.scan.roots,
            ProcessOptions::default(),
            config.server.workers,
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mkp_av::{Extractor, FlagWriter};
    use mkp_core::Result;
    use mkp_engine::FlagDelta;
    use std::path::Path;

    struct NoopExtractor;

    #[async_trait]
    impl Extractor for NoopExtractor {
        async fn extract(&self, _path: &Path) -> Result<Vec<mkp_core::Track>> {
            Ok(Vec::new())
        }
    }

    struct NoopWriter;

    #[async_trait]
    impl FlagWriter for NoopWriter {
        async fn apply(&self, _path: &Path, _deltas: &[FlagDelta]) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let coordinator = Arc::new(Coordinator::new(
            mkp_db::init_memory_pool().unwrap(),
            ProfileSet::default(),
            Arc::new(NoopExtractor),
            Arc::new(NoopWriter),
            Duration::from_secs(1),
        ));
        let mut config = Config::default();
        config.schedule.interval_secs = 3600;
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_scheduler(
            coordinator,
            Arc::new(config),
            cancel.clone(),
        ));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler should stop promptly")
            .unwrap();
    }
}
