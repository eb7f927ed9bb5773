// src/scrape/strategies/syndication.rs
//! Embed/syndication lookups by tweet id. Never a timeline source; feeds
//! enrichment and single-tweet lookups.

use std::collections::HashMap;

use futures::future::join_all;
use serde_json::Value;

use super::{array_at, object_at, parse_json, str_at, u64_at, url_with_params, StrategyContext};
use crate::config::MAX_ENRICHMENT_LIMIT;
use crate::parse::metric::parse_date;
use crate::parse::text::decode_attr;
use crate::scrape::http::HttpRequest;
use crate::scrape::types::{ScrapedTweet, StrategyError, TweetMetrics};

pub const METHOD: &str = "syndication";

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Request token the embed endpoint expects: `(id / 1e15) * pi` written in
/// base 36, with every `0` and the radix point removed.
pub fn syndication_token(id: &str) -> String {
    let n = id.parse::<f64>().unwrap_or(0.0) / 1e15 * std::f64::consts::PI;

    let mut int = n.trunc() as u64;
    let mut int_digits = Vec::new();
    loop {
        int_digits.push(BASE36[(int % 36) as usize]);
        int /= 36;
        if int == 0 {
            break;
        }
    }
    int_digits.reverse();

    let mut frac = n.fract();
    let mut out: String = int_digits.into_iter().map(char::from).collect();
    for _ in 0..11 {
        if frac <= 0.0 {
            break;
        }
        frac *= 36.0;
        let d = frac.trunc() as usize;
        out.push(char::from(BASE36[d.min(35)]));
        frac = frac.fract();
    }
    out.retain(|c| c != '0');
    out
}

/// `tweet-result` payload -> record. Tombstones and blank posts are `Empty`.
pub fn map_syndication_tweet(v: &Value) -> Result<ScrapedTweet, StrategyError> {
    if str_at(v, "/__typename").as_deref() == Some("TweetTombstone") {
        return Err(StrategyError::Empty);
    }
    let id = str_at(v, "/id_str").ok_or(StrategyError::Empty)?;
    let content = decode_attr(&str_at(v, "/text").unwrap_or_default());
    if content.is_empty() {
        return Err(StrategyError::Empty);
    }

    let author_handle = str_at(v, "/user/screen_name").unwrap_or_default();
    let author_name = str_at(v, "/user/name").unwrap_or_else(|| author_handle.clone());

    let mut media_urls: Vec<String> = array_at(v, "/mediaDetails")
        .iter()
        .filter_map(|m| str_at(m, "/media_url_https"))
        .collect();
    if media_urls.is_empty() {
        media_urls = array_at(v, "/photos").iter().filter_map(|p| str_at(p, "/url")).collect();
    }

    let quoted_tweet_url = object_at(v, "/quoted_tweet").and_then(|q| {
        let qid = str_at(q, "/id_str")?;
        let qhandle = str_at(q, "/user/screen_name").unwrap_or_default();
        Some(ScrapedTweet::canonical_url(&qhandle, &qid))
    });

    Ok(ScrapedTweet {
        url: ScrapedTweet::canonical_url(&author_handle, &id),
        is_retweet: content.to_ascii_lowercase().starts_with("rt @"),
        content,
        author_handle,
        author_name,
        posted_at: str_at(v, "/created_at")
            .and_then(|d| parse_date(&d))
            .unwrap_or_else(chrono::Utc::now),
        metrics: TweetMetrics {
            likes: u64_at(v, "/favorite_count").unwrap_or(0),
            retweets: u64_at(v, "/retweet_count").unwrap_or(0),
            replies: u64_at(v, "/conversation_count").unwrap_or(0),
            quotes: u64_at(v, "/quote_count").unwrap_or(0),
            views: None,
        },
        media_urls,
        is_quote: quoted_tweet_url.is_some(),
        quoted_tweet_url,
        id,
    })
}

pub async fn fetch_tweet(
    ctx: &StrategyContext<'_>,
    id: &str,
) -> Result<ScrapedTweet, StrategyError> {
    let base = format!(
        "{}/tweet-result",
        ctx.config.syndication.base_url.trim_end_matches('/')
    );
    let token = syndication_token(id);
    let url = url_with_params(&base, &[("id", id), ("lang", "en"), ("token", token.as_str())])?;
    let body = ctx
        .fetch_ok(HttpRequest::get(url, ctx.config.timeouts.syndication()))
        .await?;
    // The endpoint answers 200 with an empty body for deleted posts.
    if body.trim().is_empty() {
        return Err(StrategyError::Empty);
    }
    map_syndication_tweet(&parse_json(&body)?)
}

/// Concurrent lookups for up to `limit` ids (never more than the hard cap).
/// Misses are dropped; the map holds only hits.
pub async fn fetch_many(
    ctx: &StrategyContext<'_>,
    ids: &[String],
    limit: usize,
) -> HashMap<String, ScrapedTweet> {
    let take = limit.min(MAX_ENRICHMENT_LIMIT);
    let lookups = ids
        .iter()
        .take(take)
        .map(|id| async move { (id, fetch_tweet(ctx, id).await) });

    let mut hits = HashMap::new();
    for (id, outcome) in join_all(lookups).await {
        match outcome {
            Ok(t) => {
                hits.insert(id.clone(), t);
            }
            Err(e) => tracing::debug!(id = %id, error = %e, "syndication miss"),
        }
    }
    hits
}
