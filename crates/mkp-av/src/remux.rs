//! Container rewrites via `mkvmerge`.
//!
//! A remux writes a new container next to the original and renames it into
//! place on success. Unlike the in-place flag edits this breaks hardlinks,
//! which is why remuxing is strictly opt-in.

use std::path::Path;

use async_trait::async_trait;

use mkp_core::{Error, Result, Track, TrackKind};
use mkp_engine::RemuxPlan;

use crate::command::ToolCommand;
use crate::tools::ToolConfig;

/// Rewrites a container according to a [`RemuxPlan`].
#[async_trait]
pub trait Remuxer: Send + Sync {
    /// Rewrite `path` in place, reordering and dropping tracks per `plan`.
    async fn remux(&self, path: &Path, tracks: &[Track], plan: &RemuxPlan) -> Result<()>;
}

/// Production remuxer shelling out to `mkvmerge`.
pub struct MkvmergeRemuxer {
    tool: ToolConfig,
}

impl MkvmergeRemuxer {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }

    fn build_options(
        input: &Path,
        output: &Path,
        tracks: &[Track],
        plan: &RemuxPlan,
    ) -> Vec<String> {
        let mut options = vec!["-o".to_string(), output.display().to_string()];

        // Track selection only needs stating for kinds that lose a track.
        for (kind, flag) in [
            (TrackKind::Audio, "--audio-tracks"),
            (TrackKind::Subtitle, "--subtitle-tracks"),
        ] {
            let stripped_any = tracks
                .iter()
                .any(|t| t.kind == kind && plan.strip.contains(&t.index));
            if !stripped_any {
                continue;
            }
            let kept: Vec<String> = tracks
                .iter()
                .filter(|t| t.kind == kind && !plan.strip.contains(&t.index))
                .map(|t| t.index.to_string())
                .collect();
            if kept.is_empty() {
                options.push(match kind {
                    TrackKind::Audio => "--no-audio".to_string(),
                    TrackKind::Subtitle => "--no-subtitles".to_string(),
                    TrackKind::Video => unreachable!(),
                });
            } else {
                options.push(flag.to_string());
                options.push(kept.join(","));
            }
        }

        if !plan.order.is_empty() {
            let order: Vec<String> = plan.order.iter().map(|i| format!("0:{i}")).collect();
            options.push("--track-order".to_string());
            options.push(order.join(","));
        }

        options.push(input.display().to_string());
        options
    }
}

#[async_trait]
impl Remuxer for MkvmergeRemuxer {
    async fn remux(&self, path: &Path, tracks: &[Track], plan: &RemuxPlan) -> Result<()> {
        if !plan.needed {
            return Ok(());
        }

        let parent = path
            .parent()
            .ok_or_else(|| Error::remux("mkvmerge", format!("no parent dir: {}", path.display())))?;
        // Same filesystem as the target so the final rename is atomic.
        let staging = tempfile::Builder::new()
            .prefix(".mkvpriority-remux-")
            .suffix(".mkv")
            .tempfile_in(parent)
            .map_err(|e| Error::remux("mkvmerge", format!("cannot create staging file: {e}")))?
            .into_temp_path();

        let options = Self::build_options(path, &staging, tracks, plan);
        ToolCommand::new(self.tool.path.clone())
            .timeout(self.tool.timeout)
            .options_via_file(&options)
            .map_err(|f| Error::remux(f.tool, f.message))?
            .execute()
            .await
            .map_err(|f| Error::remux(f.tool, f.message))?;

        tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| Error::remux("mkvmerge", format!("cannot replace original: {e}")))?;
        // Disarm cleanup; the staging path now is the original.
        let _ = staging.keep();

        tracing::info!(
            path = %path.display(),
            stripped = plan.strip.len(),
            "container rewritten"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mkp_core::TrackFlags;
    use std::path::PathBuf;

    fn track(index: usize, kind: TrackKind) -> Track {
        Track {
            index,
            uid: index as i64,
            kind,
            language: "und".into(),
            codec: String::new(),
            channels: 0,
            name: None,
            flags: TrackFlags::default(),
        }
    }

    #[test]
    fn build_options_reorder_only() {
        let tracks = vec![
            track(0, TrackKind::Video),
            track(1, TrackKind::Audio),
            track(2, TrackKind::Audio),
        ];
        let plan = RemuxPlan {
            order: vec![0, 2, 1],
            strip: vec![],
            needed: true,
        };
        let options = MkvmergeRemuxer::build_options(
            &PathBuf::from("/m/in.mkv"),
            &PathBuf::from("/m/.tmp.mkv"),
            &tracks,
            &plan,
        );

        assert_eq!(
            options,
            vec![
                "-o",
                "/m/.tmp.mkv",
                "--track-order",
                "0:0,0:2,0:1",
                "/m/in.mkv"
            ]
        );
    }

    #[test]
    fn build_options_with_strip() {
        let tracks = vec![
            track(0, TrackKind::Video),
            track(1, TrackKind::Audio),
            track(2, TrackKind::Audio),
            track(3, TrackKind::Subtitle),
        ];
        let plan = RemuxPlan {
            order: vec![0, 1, 3],
            strip: vec![2],
            needed: true,
        };
        let options = MkvmergeRemuxer::build_options(
            &PathBuf::from("/m/in.mkv"),
            &PathBuf::from("/m/.tmp.mkv"),
            &tracks,
            &plan,
        );

        let joined = options.join(" ");
        assert!(joined.contains("--audio-tracks 1"));
        assert!(!joined.contains("--subtitle-tracks"));
        assert!(joined.contains("--track-order 0:0,0:1,0:3"));
    }

    #[test]
    fn build_options_all_subtitles_stripped() {
        let tracks = vec![track(0, TrackKind::Video), track(1, TrackKind::Subtitle)];
        let plan = RemuxPlan {
            order: vec![0],
            strip: vec![1],
            needed: true,
        };
        let options = MkvmergeRemuxer::build_options(
            &PathBuf::from("/m/in.mkv"),
            &PathBuf::from("/m/.tmp.mkv"),
            &tracks,
            &plan,
        );
        assert!(options.contains(&"--no-subtitles".to_string()));
    }
}
