//! Scoring profiles and application configuration.
//!
//! A [`Profile`] holds the scoring tables and flag modes for one tag; a
//! [`ProfileSet`] maps tags to profiles with a default fallback. The
//! top-level [`Config`] is deserialized from TOML and carries all sub-configs
//! for server, archive, scanning, scheduling, tools, and *arr integrations.
//! Every section defaults sensibly so an empty file is valid.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::track::FlagMode;

// ---------------------------------------------------------------------------
// Scoring profile
// ---------------------------------------------------------------------------

/// Sentinel language key replaced by an item's original language when a
/// catalog provider supplies one.
pub const ORIGINAL_LANGUAGE_KEY: &str = "org";

/// Scoring tables and flag modes for one tag.
///
/// Weights are additive: a track's score is the sum of every table lookup
/// that matches, and a missing entry contributes zero. Filters match
/// case-insensitively as substrings of the track name, each matching filter
/// contributing independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub audio_mode: Vec<FlagMode>,
    pub audio_languages: HashMap<String, i64>,
    pub audio_codecs: HashMap<String, i64>,
    /// Channel-count weights, keyed by the stringified count ("6", "2").
    pub audio_channels: HashMap<String, i64>,
    pub audio_filters: HashMap<String, i64>,
    pub subtitle_mode: Vec<FlagMode>,
    pub subtitle_languages: HashMap<String, i64>,
    pub subtitle_codecs: HashMap<String, i64>,
    pub subtitle_filters: HashMap<String, i64>,
}

/// Raw TOML shape, including the deprecated `[track_filters]` table.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawProfile {
    audio_mode: Vec<FlagMode>,
    audio_languages: HashMap<String, i64>,
    audio_codecs: HashMap<String, i64>,
    audio_channels: HashMap<String, i64>,
    audio_filters: HashMap<String, i64>,
    subtitle_mode: Vec<FlagMode>,
    subtitle_languages: HashMap<String, i64>,
    subtitle_codecs: HashMap<String, i64>,
    subtitle_filters: HashMap<String, i64>,
    track_filters: HashMap<String, i64>,
}

impl Default for RawProfile {
    fn default() -> Self {
        Self {
            audio_mode: Vec::new(),
            audio_languages: HashMap::new(),
            audio_codecs: HashMap::new(),
            audio_channels: HashMap::new(),
            audio_filters: HashMap::new(),
            subtitle_mode: Vec::new(),
            subtitle_languages: HashMap::new(),
            subtitle_codecs: HashMap::new(),
            subtitle_filters: HashMap::new(),
            track_filters: HashMap::new(),
        }
    }
}

impl Profile {
    /// Parse a profile from TOML text.
    ///
    /// Unknown mode names fail here, at load time, never at apply time.
    /// A `[track_filters]` table is accepted as a deprecated alias for
    /// `[subtitle_filters]`.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let raw: RawProfile = toml::from_str(toml_str)
            .map_err(|e| Error::config(format!("profile parse error: {e}")))?;

        let mut subtitle_filters = raw.subtitle_filters;
        if !raw.track_filters.is_empty() {
            if subtitle_filters.is_empty() {
                tracing::warn!(
                    "[track_filters] is deprecated; use [subtitle_filters] instead"
                );
                subtitle_filters = raw.track_filters;
            } else {
                tracing::warn!("[track_filters] ignored because [subtitle_filters] is present");
            }
        }

        Ok(Self {
            audio_mode: raw.audio_mode,
            audio_languages: raw.audio_languages,
            audio_codecs: raw.audio_codecs,
            audio_channels: raw.audio_channels,
            audio_filters: raw.audio_filters,
            subtitle_mode: raw.subtitle_mode,
            subtitle_languages: raw.subtitle_languages,
            subtitle_codecs: raw.subtitle_codecs,
            subtitle_filters,
        })
    }

    /// Load a profile from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read profile {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Return a copy with the `org` sentinel weight mapped to a concrete
    /// original-language code, in both language tables where present.
    ///
    /// Absence of the provider (or of the sentinel) leaves the profile
    /// untouched.
    pub fn with_original_language(&self, lang: &str) -> Self {
        let mut profile = self.clone();
        if let Some(&weight) = profile.audio_languages.get(ORIGINAL_LANGUAGE_KEY) {
            profile.audio_languages.insert(lang.to_string(), weight);
        }
        if let Some(&weight) = profile.subtitle_languages.get(ORIGINAL_LANGUAGE_KEY) {
            profile.subtitle_languages.insert(lang.to_string(), weight);
        }
        profile
    }
}

// ---------------------------------------------------------------------------
// ProfileSet
// ---------------------------------------------------------------------------

/// Tag-scoped profile registry with a default fallback.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    default: Profile,
    tagged: BTreeMap<String, Profile>,
}

impl ProfileSet {
    /// Build a set from a default profile and tagged overrides.
    pub fn new(default: Profile, tagged: BTreeMap<String, Profile>) -> Self {
        Self { default, tagged }
    }

    /// Load all profiles registered in the application config.
    ///
    /// Entries without a tag (or tagged "default") become the default
    /// profile; the last untagged entry wins, matching how repeated `-c`
    /// flags behave. A missing or malformed file fails the load.
    pub fn load(refs: &[ProfileRef]) -> Result<Self> {
        let mut default = Profile::default();
        let mut tagged = BTreeMap::new();

        for profile_ref in refs {
            let profile = Profile::from_file(&profile_ref.path)?;
            match profile_ref.tag.as_deref() {
                None | Some("default") => default = profile,
                Some(tag) => {
                    tagged.insert(tag.to_string(), profile);
                }
            }
        }

        Ok(Self { default, tagged })
    }

    /// Resolve the profile for an item carrying `tags`.
    ///
    /// Picks the lexically-first tag that has a registered profile, falling
    /// back to the default profile when none match.
    pub fn resolve(&self, tags: &[String]) -> &Profile {
        let mut sorted: Vec<&String> = tags.iter().collect();
        sorted.sort();
        sorted
            .into_iter()
            .find_map(|tag| self.tagged.get(tag))
            .unwrap_or(&self.default)
    }

    /// The fallback profile.
    pub fn default_profile(&self) -> &Profile {
        &self.default
    }

    /// Registered tags, in lexical order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tagged.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Application config
// ---------------------------------------------------------------------------

/// Root application configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub archive: ArchiveConfig,
    pub scan: ScanConfig,
    pub schedule: ScheduleConfig,
    pub tools: ToolsConfig,
    #[serde(default)]
    pub arrs: Vec<ArrConfig>,
    #[serde(default)]
    pub profiles: Vec<ProfileRef>,
}

impl Config {
    /// Deserialize a `Config` from TOML text.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist. A present-but-malformed
    /// file is an error: silently ignoring it would run with the wrong
    /// scoring tables.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::config(format!(
                "cannot read config {}: {e}",
                path.display()
            ))),
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.schedule.enabled && self.scan.roots.is_empty() {
            warnings.push("schedule is enabled but scan.roots is empty".into());
        }

        if self.schedule.enabled && self.schedule.interval_secs < 60 {
            warnings.push(format!(
                "schedule.interval_secs is {}; re-scans more often than once a minute \
                 rarely make sense",
                self.schedule.interval_secs
            ));
        }

        for (i, arr) in self.arrs.iter().enumerate() {
            if arr.url.is_empty() {
                warnings.push(format!("arrs[{i}].url is empty"));
            }
            if arr.api_key.is_empty() {
                warnings.push(format!("arrs[{i}].api_key is empty"));
            }
        }

        for (i, profile) in self.profiles.iter().enumerate() {
            if !profile.path.exists() {
                warnings.push(format!(
                    "profiles[{i}].path does not exist: {}",
                    profile.path.display()
                ));
            }
        }

        warnings
    }
}

/// HTTP receiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker tasks draining the processing queue.
    pub workers: usize,
    /// Capacity of the processing queue.
    pub queue_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            workers: 4,
            queue_size: 256,
        }
    }
}

/// Archive store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub db_path: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("archive.db"),
        }
    }
}

/// A directory tree to scan, optionally bound to a profile tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRoot {
    pub path: PathBuf,
    #[serde(default)]
    pub tag: Option<String>,
}

/// Batch / scheduled scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub roots: Vec<ScanRoot>,
    /// Seconds to wait for a file's lock before dropping a duplicate request.
    pub lock_wait_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            lock_wait_secs: 30,
        }
    }
}

/// Periodic re-scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 24 * 60 * 60,
        }
    }
}

/// Paths to external CLI tools, overriding `PATH` lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub mkvmerge_path: Option<PathBuf>,
    pub mkvpropedit_path: Option<PathBuf>,
    /// Seconds before a tool invocation is killed and treated as failed.
    pub timeout_secs: Option<u64>,
}

/// Which *arr flavor an integration talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrKind {
    Radarr,
    Sonarr,
}

/// Configuration for an *arr (Radarr / Sonarr) original-language provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ArrKind,
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Registration of a scoring profile file, optionally bound to a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRef {
    pub path: PathBuf,
    #[serde(default)]
    pub tag: Option<String>,
}
