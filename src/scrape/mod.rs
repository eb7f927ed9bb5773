// src/scrape/mod.rs
//! Orchestrator: tries acquisition tiers in priority order and returns the
//! first usable result, enriching mirror results with embed metadata.

pub mod enrich;
pub mod filter;
pub mod http;
pub mod strategies;
pub mod types;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::credentials::{CredentialStore, Credentials};
use crate::parse::metric::{normalize_handle, resolve_tweet_id};
use crate::scrape::enrich::apply_enrichment;
use crate::scrape::filter::filter_tweets;
use crate::scrape::http::{HttpClient, ReqwestHttpClient};
use crate::scrape::strategies::{
    direct, mirror_html, mirror_rss, paid_api, syndication, StrategyContext,
};
use crate::scrape::types::{
    summarize_failures, Attempt, AttemptOutcome, ProfileResult, ScrapeOptions, ScrapeResult,
    ScrapedTweet,
};

/// Method reported when every tier failed.
pub const METHOD_NONE: &str = "none";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "scrape_attempts_total",
            "Strategy and mirror attempts by method and outcome."
        );
        describe_counter!("scrape_tweets_returned_total", "Tweets returned to callers.");
        describe_histogram!("scrape_parse_ms", "Mirror page/feed parse time in milliseconds.");
    });
}

fn record_attempts(attempts: &[Attempt]) {
    for a in attempts {
        let outcome = match &a.outcome {
            AttemptOutcome::Fetched { .. } => "fetched",
            AttemptOutcome::Failed { error } => error.kind(),
        };
        counter!(
            "scrape_attempts_total",
            "method" => a.method.clone(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    PaidApi,
    DirectSession,
    MirrorHtml,
    MirrorRss,
}

impl Tier {
    const ORDER: [Tier; 4] = [
        Tier::PaidApi,
        Tier::DirectSession,
        Tier::MirrorHtml,
        Tier::MirrorRss,
    ];

    /// Mirror results carry truncated text and partial counts.
    fn enrichable(self) -> bool {
        matches!(self, Tier::MirrorHtml | Tier::MirrorRss)
    }
}

pub struct Scraper {
    http: Arc<dyn HttpClient>,
    config: Arc<ScraperConfig>,
    credentials: CredentialStore,
}

impl Scraper {
    pub fn new(http: Arc<dyn HttpClient>, config: Arc<ScraperConfig>) -> Self {
        ensure_metrics_described();
        Self {
            http,
            config,
            credentials: CredentialStore::default(),
        }
    }

    /// Real network client built from `config.user_agent`.
    pub fn from_config(config: ScraperConfig) -> anyhow::Result<Self> {
        let http = ReqwestHttpClient::new(&config.user_agent)?;
        Ok(Self::new(Arc::new(http), Arc::new(config)))
    }

    pub fn with_default_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = CredentialStore::new(credentials);
        self
    }

    /// Defaults used by calls that pass no explicit credentials.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    fn context<'a>(&'a self, credentials: &'a Credentials) -> StrategyContext<'a> {
        StrategyContext {
            http: self.http.as_ref(),
            config: &self.config,
            credentials,
        }
    }

    pub async fn scrape_tweets(&self, options: &ScrapeOptions) -> ScrapeResult {
        let credentials = self.credentials.snapshot();
        self.scrape_tweets_with(options, &credentials).await
    }

    /// Paid API, direct session, mirror HTML, mirror RSS; first result with at
    /// least one tweet wins. Every tier's attempts are kept on the result.
    pub async fn scrape_tweets_with(
        &self,
        options: &ScrapeOptions,
        credentials: &Credentials,
    ) -> ScrapeResult {
        let ctx = self.context(credentials);
        let handle = options.clean_handle();
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut empty_success: Option<ScrapeResult> = None;

        for tier in Tier::ORDER {
            let mut result = match tier {
                Tier::PaidApi => paid_api::fetch_timeline(&ctx, options).await,
                Tier::DirectSession => direct::fetch_timeline(&ctx, options).await,
                Tier::MirrorHtml => mirror_html::fetch_timeline(&ctx, options).await,
                Tier::MirrorRss => mirror_rss::fetch_timeline(&ctx, options).await,
            };
            record_attempts(&result.attempts);
            attempts.extend(result.attempts.iter().cloned());

            if result.is_usable() && tier.enrichable() {
                let tweets = std::mem::take(&mut result.tweets);
                result.tweets = self.enrich(&ctx, options, tweets).await;
            }

            if result.is_usable() {
                info!(
                    handle = %handle,
                    method = %result.method,
                    count = result.tweets.len(),
                    "scrape ok"
                );
                counter!("scrape_tweets_returned_total").increment(result.tweets.len() as u64);
                result.attempts = attempts;
                return result;
            }

            if result.success {
                debug!(
                    handle = %handle,
                    method = %result.method,
                    "tier matched nothing after filtering"
                );
                empty_success.get_or_insert(result);
            } else {
                debug!(handle = %handle, ?tier, error = ?result.error, "tier failed");
            }
        }

        if let Some(mut result) = empty_success {
            result.attempts = attempts;
            return result;
        }
        let error = summarize_failures(&attempts);
        warn!(handle = %handle, error = %error, "all strategies failed");
        ScrapeResult::failed(error, METHOD_NONE, attempts)
    }

    /// Best-effort; misses and failures leave tweets untouched. Merged text
    /// can expose a reply mention or retweet prefix the mirror rendered
    /// elsewhere, so the filters run again on the enriched records.
    async fn enrich(
        &self,
        ctx: &StrategyContext<'_>,
        options: &ScrapeOptions,
        mut tweets: Vec<ScrapedTweet>,
    ) -> Vec<ScrapedTweet> {
        let limit = self.config.syndication.enrichment_limit;
        if limit == 0 || tweets.is_empty() {
            return tweets;
        }
        let ids: Vec<String> = tweets.iter().map(|t| t.id.clone()).collect();
        let hits = syndication::fetch_many(ctx, &ids, limit).await;
        let merged = apply_enrichment(&mut tweets, &hits);
        let before = tweets.len();
        let tweets = filter_tweets(tweets, options);
        debug!(
            requested = ids.len().min(limit),
            merged,
            dropped = before - tweets.len(),
            "enrichment done"
        );
        tweets
    }

    pub async fn scrape_single_tweet(&self, url_or_id: &str) -> Option<ScrapedTweet> {
        let credentials = self.credentials.snapshot();
        let ctx = self.context(&credentials);
        let id = resolve_tweet_id(url_or_id)?;
        match syndication::fetch_tweet(&ctx, &id).await {
            Ok(t) => {
                record_attempts(&[Attempt::fetched(syndication::METHOD, 1)]);
                Some(t)
            }
            Err(e) => {
                debug!(id = %id, error = %e, "single tweet lookup failed");
                record_attempts(&[Attempt::failed(syndication::METHOD, e)]);
                None
            }
        }
    }

    pub async fn scrape_multiple_kols(
        &self,
        handles: &[String],
        keywords: &[String],
        max_per_handle: usize,
    ) -> HashMap<String, ScrapeResult> {
        let credentials = self.credentials.snapshot();
        self.scrape_multiple_kols_with(handles, keywords, max_per_handle, &credentials)
            .await
    }

    /// Handles are normalized (trimmed, `@` stripped, lower-cased) and scraped
    /// once each, `batch.size` at a time with `batch.delay_ms` between batches.
    pub async fn scrape_multiple_kols_with(
        &self,
        handles: &[String],
        keywords: &[String],
        max_per_handle: usize,
        credentials: &Credentials,
    ) -> HashMap<String, ScrapeResult> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = handles
            .iter()
            .map(|h| normalize_handle(h))
            .filter(|h| !h.is_empty() && seen.insert(h.clone()))
            .collect();

        let batch_size = self.config.batch.size.max(1);
        let delay = Duration::from_millis(self.config.batch.delay_ms);
        let mut out = HashMap::with_capacity(unique.len());

        for (i, batch) in unique.chunks(batch_size).enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let jobs = batch.iter().map(|handle| async move {
                let options = ScrapeOptions::new(handle.clone())
                    .with_keywords(keywords.to_vec())
                    .with_max_tweets(max_per_handle);
                (handle.clone(), self.scrape_tweets_with(&options, credentials).await)
            });
            out.extend(join_all(jobs).await);
        }
        info!(handles = out.len(), "batch scrape done");
        out
    }

    pub async fn scrape_profile(&self, handle: &str) -> ProfileResult {
        let credentials = self.credentials.snapshot();
        self.scrape_profile_with(handle, &credentials).await
    }

    /// Paid API, direct session, then the mirror profile card.
    pub async fn scrape_profile_with(
        &self,
        handle: &str,
        credentials: &Credentials,
    ) -> ProfileResult {
        let ctx = self.context(credentials);
        let handle = handle.trim().trim_start_matches('@');
        let mut attempts = Vec::new();

        for tier in [Tier::PaidApi, Tier::DirectSession, Tier::MirrorHtml] {
            let mut result = match tier {
                Tier::PaidApi => paid_api::fetch_profile(&ctx, handle).await,
                Tier::DirectSession => direct::fetch_profile(&ctx, handle).await,
                _ => mirror_html::fetch_profile(&ctx, handle).await,
            };
            record_attempts(&result.attempts);
            attempts.extend(result.attempts.iter().cloned());
            if result.success {
                result.attempts = attempts;
                return result;
            }
        }
        ProfileResult::failed(summarize_failures(&attempts), METHOD_NONE, attempts)
    }
}
