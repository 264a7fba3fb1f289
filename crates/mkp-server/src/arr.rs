//! Radarr / Sonarr original-language lookup.
//!
//! The provider is strictly optional: absence, misconfiguration, or a failed
//! request only means the `org` scoring dimension is skipped for that item.
//! Failures are logged and swallowed here, never surfaced to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use mkp_core::config::{ArrConfig, ArrKind};

/// Connection timeout for arr API requests.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves the original language of a catalog item.
#[async_trait]
pub trait LanguageProvider: Send + Sync {
    /// Return the ISO 639-2 original-language code for the item, if the
    /// provider knows it. `item_type` is the webhook's `movie` / `series`.
    async fn original_language(&self, item_type: &str, item_id: i64) -> Option<String>;
}

/// Language provider backed by configured Radarr/Sonarr instances.
pub struct ArrLanguageProvider {
    clients: Vec<ArrApi>,
}

impl ArrLanguageProvider {
    /// Build a provider from the enabled arr entries. Returns `None` when
    /// nothing is configured, so callers can skip the lookup entirely.
    pub fn from_config(configs: &[ArrConfig]) -> Option<Self> {
        let clients: Vec<ArrApi> = configs
            .iter()
            .filter(|c| c.enabled)
            .map(ArrApi::new)
            .collect();
        if clients.is_empty() {
            None
        } else {
            Some(Self { clients })
        }
    }
}

#[async_trait]
impl LanguageProvider for ArrLanguageProvider {
    async fn original_language(&self, item_type: &str, item_id: i64) -> Option<String> {
        let wanted = match item_type {
            "movie" => ArrKind::Radarr,
            "series" | "episode" => ArrKind::Sonarr,
            _ => return None,
        };

        for api in self.clients.iter().filter(|c| c.kind == wanted) {
            match api.original_language(item_id).await {
                Ok(Some(name)) => {
                    let code = language_code(&name);
                    if code.is_none() {
                        tracing::warn!(name, "no ISO 639-2 code for original language");
                    }
                    return code.map(str::to_string);
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(arr = %api.name, error = %e, "original-language lookup failed");
                }
            }
        }
        None
    }
}

struct ArrApi {
    name: String,
    kind: ArrKind,
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ItemResponse {
    #[serde(rename = "originalLanguage")]
    original_language: Option<OriginalLanguage>,
}

#[derive(Deserialize)]
struct OriginalLanguage {
    name: String,
}

impl ArrApi {
    fn new(config: &ArrConfig) -> Self {
        let client = Client::builder()
            .timeout(CONNECTION_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {e}");
                Client::new()
            });

        Self {
            name: config.name.clone(),
            kind: config.kind,
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    async fn original_language(&self, item_id: i64) -> reqwest::Result<Option<String>> {
        let resource = match self.kind {
            ArrKind::Radarr => "movie",
            ArrKind::Sonarr => "series",
        };
        let url = format!("{}/api/v3/{resource}/{item_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?
            .error_for_status()?;

        let item: ItemResponse = response.json().await?;
        Ok(item.original_language.map(|l| l.name))
    }
}

/// Map an arr language display name to its ISO 639-2/B code.
///
/// Covers the languages Radarr and Sonarr actually emit; unknown names
/// resolve to `None` and merely skip the `org` dimension.
pub fn language_code(name: &str) -> Option<&'static str> {
    let code = match name.to_lowercase().as_str() {
        "english" => "eng",
        "japanese" => "jpn",
        "french" => "fre",
        "german" => "ger",
        "spanish" => "spa",
        "italian" => "ita",
        "korean" => "kor",
        "chinese" => "chi",
        "cantonese" => "yue",
        "mandarin" => "cmn",
        "russian" => "rus",
        "portuguese" => "por",
        "portuguese (brazil)" => "por",
        "dutch" => "dut",
        "swedish" => "swe",
        "danish" => "dan",
        "norwegian" => "nor",
        "finnish" => "fin",
        "icelandic" => "ice",
        "polish" => "pol",
        "czech" => "cze",
        "slovak" => "slo",
        "hungarian" => "hun",
        "romanian" => "rum",
        "bulgarian" => "bul",
        "greek" => "gre",
        "turkish" => "tur",
        "arabic" => "ara",
        "hebrew" => "heb",
        "hindi" => "hin",
        "tamil" => "tam",
        "telugu" => "tel",
        "malayalam" => "mal",
        "bengali" => "ben",
        "thai" => "tha",
        "vietnamese" => "vie",
        "indonesian" => "ind",
        "malay" => "may",
        "tagalog" => "tgl",
        "ukrainian" => "ukr",
        "persian" => "per",
        "catalan" => "cat",
        "flemish" => "dut",
        _ => return None,
    };
    Some(code)
}
