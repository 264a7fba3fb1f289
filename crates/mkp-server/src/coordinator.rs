//! The mutation coordinator: per-file serialization, archive consultation,
//! and the extract/score/plan/apply pipeline.
//!
//! All mutation paths go through [`Coordinator::handle`]; it is the only
//! place that invokes the flag writer, so the per-file lock plus the archive
//! short-circuit give the system its idempotency guarantees.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use mkp_av::{Extractor, FlagWriter, Remuxer};
use mkp_core::{Error, Fingerprint, Profile, ProfileSet, Result, Track, TrackKind};
use mkp_db::models::{ArchiveStatus, OriginalFlags};
use mkp_db::queries::archive;
use mkp_db::{get_conn, DbPool};
use mkp_engine::{plan_remux, planner, FlagDelta, FlagPlan, RemuxOptions};

use crate::arr::LanguageProvider;

/// Container formats that carry track flags but cannot be edited in place.
/// Skipped with a warning so the operator knows why nothing happened.
const UNSUPPORTED_FORMATS: &[&str] = &["mp4", "m4v", "mov", "avi", "webm"];

/// One processing request, however it arrived (CLI, webhook, scan).
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub path: PathBuf,
    /// Profile-selection tags attached to the item.
    pub tags: Vec<String>,
    /// Catalog identity for the original-language lookup, when known.
    pub item: Option<ItemRef>,
    pub options: ProcessOptions,
}

impl ProcessRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tags: Vec::new(),
            item: None,
            options: ProcessOptions::default(),
        }
    }
}

/// Catalog item reference from a webhook (`movie`/`series` + id).
#[derive(Debug, Clone)]
pub struct ItemRef {
    pub kind: String,
    pub id: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Log every decision, invoke no tool, write no archive rows.
    pub dry_run: bool,
    pub remux: RemuxOptions,
}

/// What `handle` did with a file.
#[derive(Debug)]
pub enum Outcome {
    /// Flags were mutated and the archive updated.
    Applied(FlagPlan),
    /// The file was already in the desired state (archive short-circuit or
    /// empty plan); nothing touched the container.
    Unchanged,
    /// Dry run: the plan that would have been applied.
    DryRun(FlagPlan),
    /// The file is not a processable container.
    Skipped { reason: String },
}

/// Serializes and executes all mutations.
pub struct Coordinator {
    db: DbPool,
    profiles: RwLock<ProfileSet>,
    extractor: Arc<dyn Extractor>,
    writer: Arc<dyn FlagWriter>,
    remuxer: Option<Arc<dyn Remuxer>>,
    language: Option<Arc<dyn LanguageProvider>>,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
    lock_wait: Duration,
}

impl Coordinator {
    pub fn new(
        db: DbPool,
        profiles: ProfileSet,
        extractor: Arc<dyn Extractor>,
        writer: Arc<dyn FlagWriter>,
        lock_wait: Duration,
    ) -> Self {
        Self {
            db,
            profiles: RwLock::new(profiles),
            extractor,
            writer,
            remuxer: None,
            language: None,
            locks: DashMap::new(),
            lock_wait,
        }
    }

    pub fn with_remuxer(mut self, remuxer: Arc<dyn Remuxer>) -> Self {
        self.remuxer = Some(remuxer);
        self
    }

    pub fn with_language_provider(mut self, provider: Arc<dyn LanguageProvider>) -> Self {
        self.language = Some(provider);
        self
    }

    /// Swap in freshly loaded profiles. Requests already past profile
    /// resolution keep the set they started with.
    pub fn set_profiles(&self, profiles: ProfileSet) {
        *self.profiles.write() = profiles;
    }

    /// Process one file end to end.
    pub async fn handle(&self, req: &ProcessRequest) -> Result<Outcome> {
        if let Some(reason) = unprocessable(&req.path) {
            return Ok(Outcome::Skipped { reason });
        }

        let lock = self.file_lock(&req.path);
        let guard = tokio::time::timeout(self.lock_wait, lock.lock())
            .await
            .map_err(|_| Error::LockBusy {
                path: req.path.clone(),
            })?;

        let result = self.process_locked(req).await;

        drop(guard);
        drop(lock);
        self.release_file_lock(&req.path);
        result
    }

    async fn process_locked(&self, req: &ProcessRequest) -> Result<Outcome> {
        let path_key = req.path.display().to_string();
        let fingerprint = Fingerprint::of(&req.path)?;

        // Settled at this exact fingerprint: nothing to do, and no tool is
        // invoked to find that out.
        {
            let conn = get_conn(&self.db)?;
            if let Some(entry) = archive::lookup(&conn, &path_key)? {
                if entry.status == ArchiveStatus::Applied && entry.fingerprint == fingerprint {
                    tracing::debug!(path = %path_key, "already settled, skipping");
                    return Ok(Outcome::Unchanged);
                }
            }
        }

        let profile = self.resolve_profile(req).await;
        let tracks = self.extractor.extract(&req.path).await?;
        let plan = planner::plan(&tracks, &profile);
        log_plan(&req.path, &plan, req.options.dry_run);

        if req.options.dry_run {
            return Ok(Outcome::DryRun(plan));
        }

        // Snapshotted even when nothing changes: every applied entry must
        // stay restorable, and the first-seen state wins over later runs.
        {
            let conn = get_conn(&self.db)?;
            archive::record_pending(&conn, &path_key, fingerprint)?;
            archive::snapshot_original_flags(&conn, &path_key, &snapshot(&tracks))?;
        }

        if !plan.is_empty() {
            if let Err(e) = self.writer.apply(&req.path, &plan.deltas).await {
                let conn = get_conn(&self.db)?;
                archive::set_status(&conn, &path_key, ArchiveStatus::Failed, Some(&e.to_string()))?;
                return Err(e);
            }
        }

        let mut remuxed = false;
        if req.options.remux.reorder || req.options.remux.strip {
            remuxed = self.maybe_remux(req, &tracks, &profile, &path_key).await?;
        }

        // Recorded after mutation: the header edit bumped mtime, and the
        // archive must describe the file as it now exists on disk.
        let settled = Fingerprint::of(&req.path)?;
        let conn = get_conn(&self.db)?;
        archive::record_applied(&conn, &path_key, settled, &plan)?;

        if plan.is_empty() && !remuxed {
            return Ok(Outcome::Unchanged);
        }
        Ok(Outcome::Applied(plan))
    }

    /// Write the archived original flags back and mark the entry restored.
    pub async fn restore(&self, path: &Path) -> Result<()> {
        let lock = self.file_lock(path);
        let guard = tokio::time::timeout(self.lock_wait, lock.lock())
            .await
            .map_err(|_| Error::LockBusy {
                path: path.to_path_buf(),
            })?;

        let result = self.restore_locked(path).await;

        drop(guard);
        drop(lock);
        self.release_file_lock(path);
        result
    }

    async fn restore_locked(&self, path: &Path) -> Result<()> {
        let path_key = path.display().to_string();

        let originals = {
            let conn = get_conn(&self.db)?;
            if archive::lookup(&conn, &path_key)?.is_none() {
                return Err(Error::not_found("archive entry", &path_key));
            }
            archive::original_flags(&conn, &path_key)?
        };

        // An empty snapshot (a file with no audio or subtitle tracks)
        // restores as a no-op; the entry still moves to `restored`.
        let tracks = self.extractor.extract(path).await?;
        let deltas: Vec<FlagDelta> = tracks
            .iter()
            .filter_map(|track| {
                let snapshot = originals.iter().find(|o| o.track_uid == track.uid)?;
                if snapshot.flags == track.flags {
                    return None;
                }
                Some(FlagDelta {
                    uid: track.uid,
                    index: track.index,
                    kind: track.kind,
                    from: track.flags,
                    to: snapshot.flags,
                })
            })
            .collect();

        if !deltas.is_empty() {
            self.writer.apply(path, &deltas).await?;
        }

        let conn = get_conn(&self.db)?;
        archive::set_status(&conn, &path_key, ArchiveStatus::Restored, None)?;
        tracing::info!(path = %path_key, tracks = deltas.len(), "original flags restored");
        Ok(())
    }

    /// Drop archive entries whose files have vanished from disk.
    pub fn prune(&self) -> Result<usize> {
        let conn = get_conn(&self.db)?;
        let pruned = archive::prune(&conn, |p| Path::new(p).exists())?;
        if pruned > 0 {
            tracing::info!(pruned, "archive pruned");
        }
        Ok(pruned)
    }

    async fn resolve_profile(&self, req: &ProcessRequest) -> Profile {
        let profile = self.profiles.read().resolve(&req.tags).clone();

        let (Some(provider), Some(item)) = (&self.language, &req.item) else {
            return profile;
        };
        match provider.original_language(&item.kind, item.id).await {
            Some(lang) => {
                tracing::debug!(lang, "original language resolved");
                profile.with_original_language(&lang)
            }
            None => profile,
        }
    }

    /// Run the remux step if the plan calls for one. Returns whether the
    /// container was rewritten.
    async fn maybe_remux(
        &self,
        req: &ProcessRequest,
        tracks: &[Track],
        profile: &Profile,
        path_key: &str,
    ) -> Result<bool> {
        let remux_plan = plan_remux(tracks, profile, req.options.remux);
        if !remux_plan.needed {
            return Ok(false);
        }
        let Some(remuxer) = &self.remuxer else {
            return Err(Error::remux("mkvmerge", "remux requested but unavailable"));
        };
        if let Err(e) = remuxer.remux(&req.path, tracks, &remux_plan).await {
            let conn = get_conn(&self.db)?;
            archive::set_status(&conn, path_key, ArchiveStatus::Failed, Some(&e.to_string()))?;
            return Err(e);
        }
        Ok(true)
    }

    fn file_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry once nobody holds it. Waiters keep their own
    /// clones, so the strong count stays above one until they are done and
    /// the entry survives.
    fn release_file_lock(&self, path: &Path) {
        self.locks
            .remove_if(path, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Non-MKV gate. Flag-capable but uneditable formats warrant a warning;
/// everything else (nfo, srt, partials) is silently irrelevant.
fn unprocessable(path: &Path) -> Option<String> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if ext == "mkv" {
        return None;
    }
    if UNSUPPORTED_FORMATS.contains(&ext.as_str()) {
        tracing::warn!(path = %path.display(), "unsupported container format");
        Some(format!("unsupported container format: .{ext}"))
    } else {
        tracing::debug!(path = %path.display(), "ignoring non-mkv file");
        Some(format!("not an mkv file: .{ext}"))
    }
}

fn snapshot(tracks: &[Track]) -> Vec<OriginalFlags> {
    tracks
        .iter()
        .filter(|t| matches!(t.kind, TrackKind::Audio | TrackKind::Subtitle))
        .map(|t| OriginalFlags {
            track_uid: t.uid,
            flags: t.flags,
        })
        .collect()
}

fn log_plan(path: &Path, plan: &FlagPlan, dry_run: bool) {
    for scored in plan.audio.iter().chain(plan.subtitles.iter()) {
        tracing::debug!(
            path = %path.display(),
            index = scored.index,
            language = %scored.language,
            score = scored.score,
            winner = scored.winner,
            "scored track"
        );
    }
    if dry_run {
        for delta in &plan.deltas {
            tracing::info!(
                path = %path.display(),
                uid = delta.uid,
                from = ?delta.from,
                to = ?delta.to,
                "dry run: would update flags"
            );
        }
    }
}
