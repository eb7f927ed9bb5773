// src/scrape/strategies/mirror_html.rs
//! Public read-only mirrors, HTML timeline pages. Instances are tried in
//! configured order; the first one that yields parsed tweets wins.

use metrics::histogram;

use super::{check_truncated, diagnose_page, StrategyContext};
use crate::config::MirrorConfig;
use crate::parse::html::{parse_profile_html, parse_timeline_html};
use crate::parse::schema::timeline_schema;
use crate::scrape::filter::filter_tweets;
use crate::scrape::http::HttpRequest;
use crate::scrape::types::{
    summarize_failures, Attempt, ProfileResult, ScrapeOptions, ScrapeResult, ScrapedProfile,
    ScrapedTweet, StrategyError,
};

pub const METHOD: &str = "nitter";

pub fn method_for(mirror: &MirrorConfig) -> String {
    format!("{METHOD}:{}", mirror.host())
}

fn timeline_url(mirror: &MirrorConfig, handle: &str, with_replies: bool) -> String {
    let base = mirror.base_url.trim_end_matches('/');
    if with_replies {
        format!("{base}/{handle}/with_replies")
    } else {
        format!("{base}/{handle}")
    }
}

async fn fetch_page(ctx: &StrategyContext<'_>, url: String) -> Result<String, StrategyError> {
    let req = HttpRequest::get(url, ctx.config.timeouts.mirror())
        .header("Accept", "text/html,application/xhtml+xml")
        .header("Accept-Language", "en-US,en;q=0.9");
    let body = ctx.fetch_ok(req).await?;
    check_truncated(&body, &ctx.config.soft_failure)
        .map_err(|e| diagnose_page(&body, &ctx.config.soft_failure, e))?;
    Ok(body)
}

/// One mirror: fetch, sanity-check, parse. A page with no tweets is explained
/// by a rate-limit banner when one is present.
pub async fn fetch_from_mirror(
    ctx: &StrategyContext<'_>,
    mirror: &MirrorConfig,
    options: &ScrapeOptions,
) -> Result<Vec<ScrapedTweet>, StrategyError> {
    let url = timeline_url(mirror, &options.clean_handle(), options.include_replies);
    let body = fetch_page(ctx, url).await?;

    let t0 = std::time::Instant::now();
    let tweets = parse_timeline_html(&body, &mirror.base_url, timeline_schema(&mirror.schema));
    histogram!("scrape_parse_ms", "format" => "html").record(t0.elapsed().as_secs_f64() * 1_000.0);

    if tweets.is_empty() {
        return Err(diagnose_page(&body, &ctx.config.soft_failure, StrategyError::Empty));
    }
    Ok(tweets)
}

pub async fn fetch_timeline(ctx: &StrategyContext<'_>, options: &ScrapeOptions) -> ScrapeResult {
    let mut attempts = Vec::new();
    for mirror in &ctx.config.mirrors {
        let method = method_for(mirror);
        match fetch_from_mirror(ctx, mirror, options).await {
            Ok(tweets) => {
                attempts.push(Attempt::fetched(&method, tweets.len()));
                return ScrapeResult::ok(filter_tweets(tweets, options), method, attempts);
            }
            Err(e) => {
                tracing::debug!(mirror = %method, error = %e, "mirror failed");
                attempts.push(Attempt::failed(method, e));
            }
        }
    }
    if attempts.is_empty() {
        let error = StrategyError::NotConfigured("mirrors".to_string());
        return ScrapeResult::from_error(METHOD, error);
    }
    ScrapeResult::failed(summarize_failures(&attempts), METHOD, attempts)
}

pub async fn fetch_profile(ctx: &StrategyContext<'_>, handle: &str) -> ProfileResult {
    let handle = handle.trim().trim_start_matches('@');
    let mut attempts = Vec::new();
    for mirror in &ctx.config.mirrors {
        let method = method_for(mirror);
        let url = timeline_url(mirror, handle, false);
        let outcome: Result<ScrapedProfile, StrategyError> = match fetch_page(ctx, url).await {
            Ok(body) => parse_profile_html(&body, &mirror.base_url).ok_or_else(|| {
                let fallback = StrategyError::Parse("no profile card".to_string());
                diagnose_page(&body, &ctx.config.soft_failure, fallback)
            }),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(p) => {
                attempts.push(Attempt::fetched(&method, 1));
                return ProfileResult::ok(p, method, attempts);
            }
            Err(e) => attempts.push(Attempt::failed(method, e)),
        }
    }
    ProfileResult::failed(summarize_failures(&attempts), METHOD, attempts)
}
