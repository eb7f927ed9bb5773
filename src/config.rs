// src/config.rs
//! Scraper configuration: mirror list, upstream endpoints, request templates,
//! timeouts and batching. Lives in TOML so rotting mirrors or changed query ids
//! are a config edit, not a redeploy.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::scrape::http::DEFAULT_USER_AGENT;

pub const ENV_SCRAPER_CONFIG_PATH: &str = "SCRAPER_CONFIG_PATH";
pub const DEFAULT_SCRAPER_CONFIG_PATH: &str = "config/scraper.toml";

/// Syndication lookups per enrichment pass are never allowed above this.
pub const MAX_ENRICHMENT_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub base_url: String,
    /// Extraction schema name, see `parse::schema::timeline_schema`.
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_schema() -> String {
    "nitter".to_string()
}

impl MirrorConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            schema: default_schema(),
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    /// Host part used in method labels (`nitter:<host>`).
    pub fn host(&self) -> String {
        reqwest::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.base_url.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub mirror_secs: u64,
    pub api_secs: u64,
    pub syndication_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            mirror_secs: 15,
            api_secs: 20,
            syndication_secs: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn mirror(&self) -> Duration {
        Duration::from_secs(self.mirror_secs)
    }
    pub fn api(&self) -> Duration {
        Duration::from_secs(self.api_secs)
    }
    pub fn syndication(&self) -> Duration {
        Duration::from_secs(self.syndication_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaidApiConfig {
    pub primary_base: String,
    pub secondary_base: String,
}

impl Default for PaidApiConfig {
    fn default() -> Self {
        Self {
            primary_base: "https://api.twitterapi.io".to_string(),
            secondary_base: "https://api.twitter.com".to_string(),
        }
    }
}

/// Request template mimicking the platform's own web client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectSessionConfig {
    pub graphql_base: String,
    pub bearer_token: String,
    pub user_by_screen_name_query_id: String,
    pub user_tweets_query_id: String,
    pub tweets_per_page: u32,
    pub features: BTreeMap<String, bool>,
}

impl Default for DirectSessionConfig {
    fn default() -> Self {
        let features = [
            ("hidden_profile_subscriptions_enabled", true),
            ("rweb_tipjar_consumption_enabled", true),
            ("responsive_web_graphql_exclude_directive_enabled", true),
            ("verified_phone_label_enabled", false),
            ("subscriptions_verification_info_is_identity_verified_enabled", true),
            ("subscriptions_verification_info_verified_since_enabled", true),
            ("highlights_tweets_tab_ui_enabled", true),
            ("responsive_web_twitter_article_notes_tab_enabled", true),
            ("creator_subscriptions_tweet_preview_api_enabled", true),
            ("responsive_web_graphql_skip_user_profile_image_extensions_enabled", false),
            ("responsive_web_graphql_timeline_navigation_enabled", true),
            ("view_counts_everywhere_api_enabled", true),
            ("longform_notetweets_consumption_enabled", true),
            ("responsive_web_edit_tweet_api_enabled", true),
            ("graphql_is_translatable_rweb_tweet_is_translatable_enabled", true),
            ("freedom_of_speech_not_reach_fetch_enabled", true),
            ("standardized_nudges_misinfo", true),
            ("tweet_awards_web_tipping_enabled", false),
            ("longform_notetweets_rich_text_read_enabled", true),
            ("responsive_web_enhance_cards_enabled", false),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            graphql_base: "https://x.com/i/api/graphql".to_string(),
            bearer_token: "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA".to_string(),
            user_by_screen_name_query_id: "G3KGOASz96M-Qu0nwmGXNg".to_string(),
            user_tweets_query_id: "E3opETHurmVJflFsUBVuUQ".to_string(),
            tweets_per_page: 40,
            features,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyndicationConfig {
    pub base_url: String,
    /// Ids enriched per timeline result (capped at `MAX_ENRICHMENT_LIMIT`).
    pub enrichment_limit: usize,
}

impl Default for SyndicationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cdn.syndication.twimg.com".to_string(),
            enrichment_limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub size: usize,
    pub delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 3,
            delay_ms: 1500,
        }
    }
}

/// Heuristics for mirror pages that return 200 but are not a timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftFailureConfig {
    pub min_body_bytes: usize,
    /// Lower-case substrings that mark a rate-limit, block or challenge page.
    pub markers: Vec<String>,
}

impl Default for SoftFailureConfig {
    fn default() -> Self {
        Self {
            min_body_bytes: 256,
            markers: [
                "rate limited",
                "rate limit exceeded",
                "too many requests",
                "instance has been rate limited",
                "user has been suspended",
                "access denied",
                "verifying your browser",
                "just a moment...",
                "cf-challenge",
                "error 403",
                "error 503",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub user_agent: String,
    pub mirrors: Vec<MirrorConfig>,
    pub timeouts: TimeoutConfig,
    pub paid_api: PaidApiConfig,
    pub direct_session: DirectSessionConfig,
    pub syndication: SyndicationConfig,
    pub batch: BatchConfig,
    pub soft_failure: SoftFailureConfig,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            mirrors: vec![
                MirrorConfig::new("https://nitter.net"),
                MirrorConfig::new("https://xcancel.com"),
                MirrorConfig::new("https://nitter.poast.org"),
                MirrorConfig::new("https://nitter.privacydev.net"),
                MirrorConfig::new("https://lightbrd.com").with_schema("nitter-legacy"),
            ],
            timeouts: TimeoutConfig::default(),
            paid_api: PaidApiConfig::default(),
            direct_session: DirectSessionConfig::default(),
            syndication: SyndicationConfig::default(),
            batch: BatchConfig::default(),
            soft_failure: SoftFailureConfig::default(),
        }
    }
}

impl ScraperConfig {
    /// Clamp values that would make the scraper misbehave.
    fn sanitize(mut self) -> Self {
        self.mirrors.retain(|m| !m.base_url.trim().is_empty());
        for m in &mut self.mirrors {
            m.base_url = m.base_url.trim().trim_end_matches('/').to_string();
        }
        self.batch.size = self.batch.size.max(1);
        self.syndication.enrichment_limit =
            self.syndication.enrichment_limit.min(MAX_ENRICHMENT_LIMIT);
        self.timeouts.mirror_secs = self.timeouts.mirror_secs.max(1);
        self.timeouts.api_secs = self.timeouts.api_secs.max(1);
        self.timeouts.syndication_secs = self.timeouts.syndication_secs.max(1);
        self.soft_failure.markers = self
            .soft_failure
            .markers
            .into_iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        if self.user_agent.trim().is_empty() {
            self.user_agent = DEFAULT_USER_AGENT.to_string();
        }
        self
    }
}

/// Load configuration from an explicit TOML file.
pub fn load_config_from(path: &Path) -> Result<ScraperConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading scraper config from {}", path.display()))?;
    let cfg: ScraperConfig =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg.sanitize())
}

/// Load configuration using env var + fallbacks:
/// 1) $SCRAPER_CONFIG_PATH
/// 2) config/scraper.toml
/// 3) built-in defaults
pub fn load_config_default() -> Result<ScraperConfig> {
    if let Ok(p) = std::env::var(ENV_SCRAPER_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("SCRAPER_CONFIG_PATH points to non-existent path"));
        }
    }
    let default_p = PathBuf::from(DEFAULT_SCRAPER_CONFIG_PATH);
    if default_p.exists() {
        return load_config_from(&default_p);
    }
    Ok(ScraperConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: ScraperConfig = toml::from_str(
            r#"
[[mirrors]]
base_url = "https://one.test/"

[[mirrors]]
base_url = "https://two.test"
schema = "nitter-legacy"

[batch]
size = 0

[syndication]
enrichment_limit = 99
"#,
        )
        .unwrap();
        let cfg = cfg.sanitize();
        assert_eq!(cfg.mirrors.len(), 2);
        assert_eq!(cfg.mirrors[0].base_url, "https://one.test");
        assert_eq!(cfg.mirrors[0].schema, "nitter");
        assert_eq!(cfg.mirrors[1].schema, "nitter-legacy");
        assert_eq!(cfg.batch.size, 1);
        assert_eq!(cfg.batch.delay_ms, 1500);
        assert_eq!(cfg.syndication.enrichment_limit, MAX_ENRICHMENT_LIMIT);
        assert_eq!(cfg.timeouts.mirror_secs, 15);
        assert!(!cfg.direct_session.features.is_empty());
    }

    #[test]
    fn shipped_file_and_builtin_mirrors_agree() {
        let shipped: ScraperConfig = toml::from_str(include_str!("../config/scraper.toml"))
            .expect("shipped config parses");
        assert_eq!(shipped.sanitize().mirrors, ScraperConfig::default().mirrors);
    }

    #[test]
    fn mirror_host_label() {
        assert_eq!(MirrorConfig::new("https://nitter.net/").host(), "nitter.net");
        assert_eq!(MirrorConfig::new("not a url").host(), "not a url");
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_SCRAPER_CONFIG_PATH);

        // No files in the temp CWD -> built-in defaults
        let cfg = load_config_default().unwrap();
        assert_eq!(cfg, ScraperConfig::default());

        // Env path wins
        let p = tmp.path().join("custom.toml");
        fs::write(&p, "[batch]\nsize = 2\n").unwrap();
        env::set_var(ENV_SCRAPER_CONFIG_PATH, p.display().to_string());
        let cfg = load_config_default().unwrap();
        assert_eq!(cfg.batch.size, 2);

        // Dangling env path is an error, not a silent default
        let missing = tmp.path().join("missing.toml");
        env::set_var(ENV_SCRAPER_CONFIG_PATH, missing.display().to_string());
        assert!(load_config_default().is_err());
        env::remove_var(ENV_SCRAPER_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
