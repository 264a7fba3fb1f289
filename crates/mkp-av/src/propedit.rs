//! Flag mutation via `mkvpropedit`.
//!
//! Mutation is an in-place header edit: it never rewrites the media payload
//! and therefore preserves hardlinks. Tracks are addressed by UID
//! (`track:=UID`), which is stable across remuxes that keep the track.

use std::path::Path;

use async_trait::async_trait;

use mkp_core::{Error, Result};
use mkp_engine::FlagDelta;

use crate::command::ToolCommand;
use crate::tools::ToolConfig;

/// Applies flag deltas to a container.
///
/// The coordinator only calls this with a non-empty delta list; an empty
/// plan must never reach the tool.
#[async_trait]
pub trait FlagWriter: Send + Sync {
    /// Apply `deltas` to the file at `path`.
    async fn apply(&self, path: &Path, deltas: &[FlagDelta]) -> Result<()>;
}

/// Production writer shelling out to `mkvpropedit`.
pub struct MkvpropeditWriter {
    tool: ToolConfig,
}

impl MkvpropeditWriter {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }

    /// Build the full argument list for one invocation. One `--edit`
    /// section per track, one `--set` per flag that changes.
    fn build_options(path: &Path, deltas: &[FlagDelta]) -> Vec<String> {
        let mut options = vec![path.display().to_string()];
        for delta in deltas {
            let mut sets = Vec::new();
            if delta.from.default != delta.to.default {
                sets.push(format!("flag-default={}", delta.to.default as u8));
            }
            if delta.from.forced != delta.to.forced {
                sets.push(format!("flag-forced={}", delta.to.forced as u8));
            }
            if delta.from.enabled != delta.to.enabled {
                sets.push(format!("flag-enabled={}", delta.to.enabled as u8));
            }
            if sets.is_empty() {
                continue;
            }
            options.push("--edit".to_string());
            options.push(format!("track:={}", delta.uid));
            for set in sets {
                options.push("--set".to_string());
                options.push(set);
            }
        }
        options
    }
}

#[async_trait]
impl FlagWriter for MkvpropeditWriter {
    async fn apply(&self, path: &Path, deltas: &[FlagDelta]) -> Result<()> {
        let options = Self::build_options(path, deltas);
        if options.len() == 1 {
            return Ok(());
        }

        ToolCommand::new(self.tool.path.clone())
            .timeout(self.tool.timeout)
            .options_via_file(&options)
            .map_err(|f| Error::mutation(f.tool, f.message))?
            .execute()
            .await
            .map_err(|f| Error::mutation(f.tool, f.message))?;

        tracing::info!(
            path = %path.display(),
            tracks = deltas.len(),
            "flags updated"
        );
        Ok(())
    }
}
