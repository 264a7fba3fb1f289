//! Directory tree scanning.
//!
//! Walks configured roots, funnels every mkv file through the coordinator
//! via a bounded queue drained by a pool of worker tasks. The per-file locks
//! in the coordinator make it safe to scan while webhooks arrive.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use walkdir::WalkDir;

use mkp_core::config::ScanRoot;

use crate::coordinator::{Coordinator, Outcome, ProcessOptions, ProcessRequest};

/// Per-batch result counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub processed: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ScanSummary {
    fn absorb(&mut self, result: &mkp_core::Result<Outcome>) {
        self.processed += 1;
        match result {
            Ok(Outcome::Applied(_)) => self.applied += 1,
            Ok(Outcome::Unchanged) | Ok(Outcome::DryRun(_)) => self.unchanged += 1,
            Ok(Outcome::Skipped { .. }) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Scan `roots` and process every mkv file found.
pub async fn scan(
    coordinator: Arc<Coordinator>,
    roots: &[ScanRoot],
    options: ProcessOptions,
    workers: usize,
) -> ScanSummary {
    let (tx, rx) = mpsc::channel::<ProcessRequest>(256);
    let rx = Arc::new(Mutex::new(rx));
    let summary = Arc::new(parking_lot::Mutex::new(ScanSummary::default()));

    let mut handles = Vec::new();
    for _ in 0..workers.max(1) {
        let rx = rx.clone();
        let coordinator = coordinator.clone();
        let summary = summary.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let Some(req) = rx.lock().await.recv().await else {
                    break;
                };
                let result = coordinator.handle(&req).await;
                if let Err(e) = &result {
                    tracing::error!(path = %req.path.display(), error = %e, "processing failed");
                }
                summary.lock().absorb(&result);
            }
        }));
    }

    for root in roots {
        for path in walk_mkv_files(root) {
            let mut req = ProcessRequest::new(path);
            req.tags = root.tag.iter().cloned().collect();
            req.options = options;
            if tx.send(req).await.is_err() {
                break;
            }
        }
    }
    drop(tx);

    for handle in handles {
        let _ = handle.await;
    }

    let summary = *summary.lock();
    tracing::info!(
        processed = summary.processed,
        applied = summary.applied,
        unchanged = summary.unchanged,
        skipped = summary.skipped,
        failed = summary.failed,
        "scan complete"
    );
    summary
}

fn walk_mkv_files(root: &ScanRoot) -> Vec<PathBuf> {
    if !root.path.exists() {
        tracing::warn!(root = %root.path.display(), "scan root does not exist");
        return Vec::new();
    }

    WalkDir::new(&root.path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!(error = %err, "walk error");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mkv"))
        })
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_finds_only_mkv_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("season 1");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("movie.mkv"), b"x").unwrap();
        std::fs::write(nested.join("episode.MKV"), b"x").unwrap();
        std::fs::write(nested.join("episode.srt"), b"x").unwrap();
        std::fs::write(dir.path().join("sample.mp4"), b"x").unwrap();

        let root = ScanRoot {
            path: dir.path().to_path_buf(),
            tag: None,
        };
        let mut files = walk_mkv_files(&root);
        files.sort();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("movie.mkv"));
        assert!(files[1].ends_with("episode.MKV"));
    }

    #[test]
    fn walk_missing_root_is_empty() {
        let root = ScanRoot {
            path: PathBuf::from("/nonexistent/media"),
            tag: None,
        };
        assert!(walk_mkv_files(&root).is_empty());
    }

    #[test]
    fn summary_absorbs_outcomes() {
        let mut summary = ScanSummary::default();
        summary.absorb(&Ok(Outcome::Applied(Default::default())));
        summary.absorb(&Ok(Outcome::Unchanged));
        summary.absorb(&Ok(Outcome::Skipped {
            reason: "not mkv".into(),
        }));
        summary.absorb(&Err(mkp_core::Error::Internal("boom".into())));

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
    }
}
