// src/scrape/strategies/mirror_rss.rs
//! Same mirrors, RSS endpoint. Feeds survive some front-end blocks that break
//! the HTML pages, but carry no engagement counts.

use super::{check_truncated, diagnose_page, StrategyContext};
use crate::config::MirrorConfig;
use crate::parse::rss::parse_timeline_rss;
use crate::scrape::filter::filter_tweets;
use crate::scrape::http::HttpRequest;
use crate::scrape::types::{
    summarize_failures, Attempt, ScrapeOptions, ScrapeResult, ScrapedTweet, StrategyError,
};

pub const METHOD: &str = "nitter-rss";

pub fn method_for(mirror: &MirrorConfig) -> String {
    format!("{METHOD}:{}", mirror.host())
}

pub async fn fetch_from_mirror(
    ctx: &StrategyContext<'_>,
    mirror: &MirrorConfig,
    handle: &str,
) -> Result<Vec<ScrapedTweet>, StrategyError> {
    let url = format!("{}/{}/rss", mirror.base_url.trim_end_matches('/'), handle);
    let req = HttpRequest::get(url, ctx.config.timeouts.mirror())
        .header("Accept", "application/rss+xml,application/xml;q=0.9,*/*;q=0.8");
    let body = ctx.fetch_ok(req).await?;
    let soft = &ctx.config.soft_failure;
    check_truncated(&body, soft).map_err(|e| diagnose_page(&body, soft, e))?;

    let tweets = parse_timeline_rss(&body, &mirror.base_url)
        .map_err(|e| diagnose_page(&body, soft, StrategyError::Parse(format!("{e:#}"))))?;
    if tweets.is_empty() {
        return Err(diagnose_page(&body, soft, StrategyError::Empty));
    }
    Ok(tweets)
}

pub async fn fetch_timeline(ctx: &StrategyContext<'_>, options: &ScrapeOptions) -> ScrapeResult {
    let handle = options.clean_handle();
    let mut attempts = Vec::new();
    for mirror in &ctx.config.mirrors {
        let method = method_for(mirror);
        match fetch_from_mirror(ctx, mirror, &handle).await {
            Ok(tweets) => {
                attempts.push(Attempt::fetched(&method, tweets.len()));
                return ScrapeResult::ok(filter_tweets(tweets, options), method, attempts);
            }
            Err(e) => {
                tracing::debug!(mirror = %method, error = %e, "rss mirror failed");
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
