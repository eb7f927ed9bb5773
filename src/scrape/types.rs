// src/scrape/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parse::metric::extract_tweet_id;

/// Engagement counters. Missing counts default to zero except `views`, where
/// `None` means the source never reported it and `Some(0)` means it reported zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TweetMetrics {
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub quotes: u64,
    pub views: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedTweet {
    pub id: String,
    pub url: String,
    pub content: String,
    pub author_handle: String,
    pub author_name: String,
    pub posted_at: DateTime<Utc>,
    pub metrics: TweetMetrics,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub is_retweet: bool,
    pub is_quote: bool,
    #[serde(default)]
    pub quoted_tweet_url: Option<String>,
}

impl ScrapedTweet {
    /// Canonical status URL for a handle + id.
    pub fn canonical_url(handle: &str, id: &str) -> String {
        let handle = if handle.is_empty() { "i" } else { handle };
        format!("https://x.com/{handle}/status/{id}")
    }

    /// True when `id` is present and agrees with the id encoded in `url`.
    pub fn has_resolvable_id(&self) -> bool {
        !self.id.is_empty() && extract_tweet_id(&self.url).as_deref() == Some(self.id.as_str())
    }

    pub fn is_reply(&self) -> bool {
        self.content.trim_start().starts_with('@')
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedProfile {
    pub handle: String,
    pub name: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub followers: Option<u64>,
    pub following: Option<u64>,
    pub tweet_count: Option<u64>,
    pub verified: bool,
    pub user_id: Option<String>,
}

fn default_max_tweets() -> usize {
    50
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptions {
    pub handle: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_max_tweets")]
    pub max_tweets: usize,
    #[serde(default)]
    pub include_replies: bool,
    #[serde(default = "default_true")]
    pub include_retweets: bool,
    #[serde(default)]
    pub since_date: Option<DateTime<Utc>>,
}

impl ScrapeOptions {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            keywords: Vec::new(),
            max_tweets: default_max_tweets(),
            include_replies: false,
            include_retweets: true,
            since_date: None,
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_max_tweets(mut self, max: usize) -> Self {
        self.max_tweets = max;
        self
    }

    /// Handle as the upstreams expect it: no `@`, no whitespace.
    pub fn clean_handle(&self) -> String {
        self.handle.trim().trim_start_matches('@').to_string()
    }
}

/// Why a single strategy (or mirror instance) produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StrategyError {
    #[error("no {0} configured")]
    NotConfigured(String),
    #[error("timed out after {after_secs}s")]
    Timeout { after_secs: u64 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}")]
    Http { status: u16 },
    #[error("blocked: {0}")]
    Blocked(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no tweets found")]
    Empty,
}

impl StrategyError {
    /// Stable label for metrics; matches the serialized `kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            StrategyError::NotConfigured(_) => "not_configured",
            StrategyError::Timeout { .. } => "timeout",
            StrategyError::Transport(_) => "transport",
            StrategyError::Http { .. } => "http",
            StrategyError::Blocked(_) => "blocked",
            StrategyError::Parse(_) => "parse",
            StrategyError::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Fetched { count: usize },
    Failed { error: StrategyError },
}

/// One try of one strategy tier or mirror instance, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub method: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl Attempt {
    pub fn fetched(method: impl Into<String>, count: usize) -> Self {
        Self {
            method: method.into(),
            outcome: AttemptOutcome::Fetched { count },
        }
    }

    pub fn failed(method: impl Into<String>, error: StrategyError) -> Self {
        Self {
            method: method.into(),
            outcome: AttemptOutcome::Failed { error },
        }
    }

    pub fn error(&self) -> Option<&StrategyError> {
        match &self.outcome {
            AttemptOutcome::Failed { error } => Some(error),
            AttemptOutcome::Fetched { .. } => None,
        }
    }
}

/// How many trailing failures are quoted in an exhaustion message.
const ERROR_SUMMARY_TAIL: usize = 3;

/// `"nitter:a: HTTP 429; nitter:b: timed out after 15s"`, skipping unconfigured tiers.
pub fn summarize_failures(attempts: &[Attempt]) -> String {
    let failures: Vec<String> = attempts
        .iter()
        .filter_map(|a| match a.error() {
            Some(StrategyError::NotConfigured(_)) | None => None,
            Some(e) => Some(format!("{}: {}", a.method, e)),
        })
        .collect();
    if failures.is_empty() {
        return "all strategies failed".to_string();
    }
    let start = failures.len().saturating_sub(ERROR_SUMMARY_TAIL);
    failures[start..].join("; ")
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResult {
    pub success: bool,
    pub tweets: Vec<ScrapedTweet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub method: String,
    pub attempts: Vec<Attempt>,
}

impl ScrapeResult {
    pub fn ok(
        tweets: Vec<ScrapedTweet>,
        method: impl Into<String>,
        attempts: Vec<Attempt>,
    ) -> Self {
        Self {
            success: true,
            tweets,
            error: None,
            method: method.into(),
            attempts,
        }
    }

    pub fn failed(
        error: impl Into<String>,
        method: impl Into<String>,
        attempts: Vec<Attempt>,
    ) -> Self {
        Self {
            success: false,
            tweets: Vec::new(),
            error: Some(error.into()),
            method: method.into(),
            attempts,
        }
    }

    /// Single-attempt failure, used by strategies that make one call.
    pub fn from_error(method: &str, error: StrategyError) -> Self {
        Self::failed(error.to_string(), method, vec![Attempt::failed(method, error)])
    }

    pub fn is_usable(&self) -> bool {
        self.success && !self.tweets.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResult {
    pub success: bool,
    pub profile: Option<ScrapedProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub method: String,
    pub attempts: Vec<Attempt>,
}

impl ProfileResult {
    pub fn ok(profile: ScrapedProfile, method: impl Into<String>, attempts: Vec<Attempt>) -> Self {
        Self {
            success: true,
            profile: Some(profile),
            error: None,
            method: method.into(),
            attempts,
        }
    }

    pub fn failed(
        error: impl Into<String>,
        method: impl Into<String>,
        attempts: Vec<Attempt>,
    ) -> Self {
        Self {
            success: false,
            profile: None,
            error: Some(error.into()),
            method: method.into(),
            attempts,
        }
    }

    pub fn from_error(method: &str, error: StrategyError) -> Self {
        Self::failed(error.to_string(), method, vec![Attempt::failed(method, error)])
    }
}
