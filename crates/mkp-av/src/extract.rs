//! Track extraction via `mkvmerge --identify`.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use mkp_core::{Error, Result, Track, TrackFlags, TrackKind};

use crate::command::ToolCommand;
use crate::tools::ToolConfig;

/// Reads the track inventory of a container.
///
/// Implemented by [`MkvmergeExtractor`] in production; tests substitute
/// stubs so the coordinator can be exercised without mkvtoolnix installed.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract all tracks from the file at `path`.
    async fn extract(&self, path: &Path) -> Result<Vec<Track>>;
}

/// Production extractor shelling out to `mkvmerge --identify`.
pub struct MkvmergeExtractor {
    tool: ToolConfig,
}

impl MkvmergeExtractor {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl Extractor for MkvmergeExtractor {
    async fn extract(&self, path: &Path) -> Result<Vec<Track>> {
        let options = vec![
            "--identification-format".to_string(),
            "json".to_string(),
            "--identify".to_string(),
            path.display().to_string(),
        ];

        let output = ToolCommand::new(self.tool.path.clone())
            .timeout(self.tool.timeout)
            .options_via_file(&options)
            .map_err(|f| Error::extraction(path, f.message))?
            .execute()
            .await
            .map_err(|f| Error::extraction(path, f.message))?;

        let identification: Identification = serde_json::from_str(&output.stdout)
            .map_err(|e| Error::extraction(path, format!("malformed identify output: {e}")))?;

        for warning in &identification.warnings {
            tracing::warn!(path = %path.display(), "mkvmerge: {warning}");
        }

        Ok(parse_tracks(identification))
    }
}

#[derive(Debug, Deserialize)]
struct Identification {
    #[serde(default)]
    tracks: Vec<RawTrack>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    id: usize,
    #[serde(rename = "type")]
    kind: TrackKind,
    #[serde(default)]
    properties: RawProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProperties {
    uid: Option<i64>,
    language: Option<String>,
    codec_id: Option<String>,
    audio_channels: Option<u32>,
    track_name: Option<String>,
    default_track: bool,
    forced_track: bool,
    /// Matroska tracks are enabled unless flagged otherwise.
    #[serde(default = "enabled_by_default")]
    enabled_track: bool,
}

fn enabled_by_default() -> bool {
    true
}

fn parse_tracks(identification: Identification) -> Vec<Track> {
    identification
        .tracks
        .into_iter()
        .filter_map(|raw| {
            let Some(uid) = raw.properties.uid else {
                // Tracks without a UID cannot be addressed by the mutation
                // tool, so they are invisible to the rest of the pipeline.
                tracing::warn!(index = raw.id, "skipping track without uid");
                return None;
            };
            Some(Track {
                index: raw.id,
                uid,
                kind: raw.kind,
                language: raw
                    .properties
                    .language
                    .unwrap_or_else(|| Track::UNDEFINED_LANGUAGE.to_string()),
                codec: raw.properties.codec_id.unwrap_or_default(),
                channels: raw.properties.audio_channels.unwrap_or(0),
                name: raw.properties.track_name,
                flags: TrackFlags {
                    default: raw.properties.default_track,
                    forced: raw.properties.forced_track,
                    enabled: raw.properties.enabled_track,
                },
            })
        })
        .collect()
}
