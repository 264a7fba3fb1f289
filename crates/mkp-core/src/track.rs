//! The track model: one audio or subtitle stream inside a container, plus
//! the flag vocabulary this system mutates.

use serde::{Deserialize, Serialize};

/// Kind of a media stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    /// mkvmerge reports this kind as `subtitles`.
    #[serde(alias = "subtitles")]
    Subtitle,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
            TrackKind::Subtitle => "subtitle",
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutable per-track flag state read by playback software.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackFlags {
    pub default: bool,
    pub forced: bool,
    pub enabled: bool,
}

/// One stream inside a media container, as reported by the extractor.
///
/// Tracks are read fresh from the container on every run and never persisted
/// directly; only flag snapshots and plans derived from them are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Position within the container, assigned by the container. Used for
    /// deterministic tie-breaking and for remux track ordering.
    pub index: usize,
    /// Container-level unique identifier, used to address the track in
    /// mutation-tool invocations and archive rows.
    pub uid: i64,
    pub kind: TrackKind,
    /// ISO-like language code; `und` when the container does not say.
    pub language: String,
    /// Codec identifier as reported by the container (e.g. `A_FLAC`).
    pub codec: String,
    /// Channel count; zero for non-audio tracks.
    pub channels: u32,
    /// Free-text track label, if present.
    pub name: Option<String>,
    pub flags: TrackFlags,
}

impl Track {
    /// The sentinel language code for untagged tracks.
    pub const UNDEFINED_LANGUAGE: &'static str = "und";
}

/// One flag operation from a profile's `audio_mode` / `subtitle_mode` list.
///
/// This is a closed vocabulary: unknown strings are rejected when the
/// profile is deserialized, not when a plan is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagMode {
    /// Winner gets `default = true`; losers get `default = false`.
    Default,
    /// Winner gets `forced = true`; losers get `forced = false`.
    Forced,
    /// Winner gets `enabled = true`; losers get `enabled = false`.
    Disabled,
    /// Winner and losers all get `enabled = true`.
    Enabled,
}

impl FlagMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagMode::Default => "default",
            FlagMode::Forced => "forced",
            FlagMode::Disabled => "disabled",
            FlagMode::Enabled => "enabled",
        }
    }
}
