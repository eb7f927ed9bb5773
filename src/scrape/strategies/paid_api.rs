// src/scrape/strategies/paid_api.rs
//! Paid third-party REST tier. The primary provider speaks a flat
//! `{tweets:[...]}` shape; the secondary speaks the v2 `{data, includes}` shape.
//! Each shape has its own mapping function.

use std::collections::HashMap;

use serde_json::Value;

use super::{
    array_at, bool_at, object_at, parse_json, str_at, u64_at, url_with_params, StrategyContext,
};
use crate::parse::metric::parse_date;
use crate::parse::text::decode_attr;
use crate::scrape::filter::filter_tweets;
use crate::scrape::http::HttpRequest;
use crate::scrape::types::{
    summarize_failures, Attempt, ProfileResult, ScrapeOptions, ScrapeResult, ScrapedProfile,
    ScrapedTweet, StrategyError, TweetMetrics,
};

pub const METHOD: &str = "paid-api";
pub const METHOD_PRIMARY: &str = "paid-api:primary";
pub const METHOD_SECONDARY: &str = "paid-api:secondary";

fn not_configured() -> StrategyError {
    StrategyError::NotConfigured("API key".to_string())
}

/// Flat shape: `{id, url, text, createdAt, likeCount, ..., author:{userName,name}}`.
pub fn map_primary_tweet(v: &Value) -> Option<ScrapedTweet> {
    let id = str_at(v, "/id")?;
    let author_handle = str_at(v, "/author/userName").unwrap_or_default();
    let content = decode_attr(&str_at(v, "/text").unwrap_or_default());

    let media_urls = array_at(v, "/extendedEntities/media")
        .iter()
        .filter_map(|m| str_at(m, "/media_url_https"))
        .collect();

    let quoted_tweet_url = object_at(v, "/quoted_tweet").and_then(|q| {
        let qid = str_at(q, "/id")?;
        let qhandle = str_at(q, "/author/userName").unwrap_or_default();
        Some(ScrapedTweet::canonical_url(&qhandle, &qid))
    });
    let is_retweet = object_at(v, "/retweeted_tweet").is_some()
        || content.to_ascii_lowercase().starts_with("rt @");

    Some(ScrapedTweet {
        url: ScrapedTweet::canonical_url(&author_handle, &id),
        author_name: str_at(v, "/author/name").unwrap_or_else(|| author_handle.clone()),
        author_handle,
        content,
        posted_at: str_at(v, "/createdAt")
            .and_then(|d| parse_date(&d))
            .unwrap_or_else(chrono::Utc::now),
        metrics: TweetMetrics {
            likes: u64_at(v, "/likeCount").unwrap_or(0),
            retweets: u64_at(v, "/retweetCount").unwrap_or(0),
            replies: u64_at(v, "/replyCount").unwrap_or(0),
            quotes: u64_at(v, "/quoteCount").unwrap_or(0),
            views: u64_at(v, "/viewCount"),
        },
        media_urls,
        is_retweet,
        is_quote: quoted_tweet_url.is_some(),
        quoted_tweet_url,
        id,
    })
}

/// Lookup tables from a v2 `includes` block.
pub struct V2Includes {
    users: HashMap<String, (String, String)>,
    media: HashMap<String, String>,
}

impl V2Includes {
    pub fn from_response(root: &Value) -> Self {
        let users = array_at(root, "/includes/users")
            .iter()
            .filter_map(|u| {
                Some((
                    str_at(u, "/id")?,
                    (str_at(u, "/username")?, str_at(u, "/name").unwrap_or_default()),
                ))
            })
            .collect();
        let media = array_at(root, "/includes/media")
            .iter()
            .filter_map(|m| {
                let url = str_at(m, "/url").or_else(|| str_at(m, "/preview_image_url"))?;
                Some((str_at(m, "/media_key")?, url))
            })
            .collect();
        Self { users, media }
    }
}

/// v2 shape: `{id, text, created_at, author_id, public_metrics, referenced_tweets}`.
pub fn map_secondary_tweet(
    v: &Value,
    includes: &V2Includes,
    fallback_handle: &str,
) -> Option<ScrapedTweet> {
    let id = str_at(v, "/id")?;
    let (author_handle, author_name) = str_at(v, "/author_id")
        .and_then(|a| includes.users.get(&a).cloned())
        .unwrap_or_else(|| (fallback_handle.to_string(), fallback_handle.to_string()));

    let mut is_retweet = false;
    let mut quoted_tweet_url = None;
    for r in array_at(v, "/referenced_tweets") {
        match (str_at(r, "/type").as_deref(), str_at(r, "/id")) {
            (Some("retweeted"), _) => is_retweet = true,
            (Some("quoted"), Some(qid)) => {
                quoted_tweet_url = Some(ScrapedTweet::canonical_url("i", &qid))
            }
            _ => {}
        }
    }

    let content = decode_attr(&str_at(v, "/text").unwrap_or_default());
    let media_urls = array_at(v, "/attachments/media_keys")
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|k| includes.media.get(k).cloned())
        .collect();

    Some(ScrapedTweet {
        url: ScrapedTweet::canonical_url(&author_handle, &id),
        is_retweet: is_retweet || content.to_ascii_lowercase().starts_with("rt @"),
        content,
        author_handle,
        author_name,
        posted_at: str_at(v, "/created_at")
            .and_then(|d| parse_date(&d))
            .unwrap_or_else(chrono::Utc::now),
        metrics: TweetMetrics {
            likes: u64_at(v, "/public_metrics/like_count").unwrap_or(0),
            retweets: u64_at(v, "/public_metrics/retweet_count").unwrap_or(0),
            replies: u64_at(v, "/public_metrics/reply_count").unwrap_or(0),
            quotes: u64_at(v, "/public_metrics/quote_count").unwrap_or(0),
            views: u64_at(v, "/public_metrics/impression_count"),
        },
        media_urls,
        is_quote: quoted_tweet_url.is_some(),
        quoted_tweet_url,
        id,
    })
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

/// GET against the primary provider with its `X-API-Key` header.
async fn primary_get(
    ctx: &StrategyContext<'_>,
    key: &str,
    path: &str,
    handle: &str,
) -> Result<Value, StrategyError> {
    let base = endpoint(&ctx.config.paid_api.primary_base, path);
    let url = url_with_params(&base, &[("userName", handle)])?;
    let req = HttpRequest::get(url, ctx.config.timeouts.api()).header("X-API-Key", key);
    parse_json(&ctx.fetch_ok(req).await?)
}

async fn fetch_primary(
    ctx: &StrategyContext<'_>,
    key: &str,
    handle: &str,
) -> Result<Vec<ScrapedTweet>, StrategyError> {
    let root = primary_get(ctx, key, "/twitter/user/last_tweets", handle).await?;

    if str_at(&root, "/status").as_deref() == Some("error") {
        let msg = str_at(&root, "/msg")
            .or_else(|| str_at(&root, "/message"))
            .unwrap_or_default();
        return Err(StrategyError::Parse(format!("provider error: {msg}")));
    }

    let items = if root.pointer("/data/tweets").is_some() {
        array_at(&root, "/data/tweets")
    } else {
        array_at(&root, "/tweets")
    };
    Ok(items.iter().filter_map(map_primary_tweet).collect())
}

async fn fetch_secondary(
    ctx: &StrategyContext<'_>,
    key: &str,
    handle: &str,
    max_results: usize,
) -> Result<Vec<ScrapedTweet>, StrategyError> {
    let base = endpoint(&ctx.config.paid_api.secondary_base, "/2/tweets/search/recent");
    let query = format!("from:{handle}");
    let max = max_results.clamp(10, 100).to_string();
    let url = url_with_params(
        &base,
        &[
            ("query", query.as_str()),
            ("max_results", max.as_str()),
            ("tweet.fields", "created_at,public_metrics,referenced_tweets,attachments,author_id"),
            ("expansions", "author_id,attachments.media_keys"),
            ("user.fields", "username,name"),
            ("media.fields", "url,preview_image_url"),
        ],
    )?;
    let req = HttpRequest::get(url, ctx.config.timeouts.api())
        .header("Authorization", format!("Bearer {key}"));
    let root = parse_json(&ctx.fetch_ok(req).await?)?;
    let includes = V2Includes::from_response(&root);
    Ok(array_at(&root, "/data")
        .iter()
        .filter_map(|t| map_secondary_tweet(t, &includes, handle))
        .collect())
}

/// Primary endpoint, then the secondary one on any primary failure.
pub async fn fetch_timeline(ctx: &StrategyContext<'_>, options: &ScrapeOptions) -> ScrapeResult {
    let Some(key) = ctx.credentials.api_key() else {
        return ScrapeResult::from_error(METHOD, not_configured());
    };
    let handle = options.clean_handle();
    let mut attempts = Vec::new();

    match fetch_primary(ctx, key, &handle).await {
        Ok(tweets) if !tweets.is_empty() => {
            attempts.push(Attempt::fetched(METHOD_PRIMARY, tweets.len()));
            return ScrapeResult::ok(filter_tweets(tweets, options), METHOD_PRIMARY, attempts);
        }
        Ok(_) => attempts.push(Attempt::failed(METHOD_PRIMARY, StrategyError::Empty)),
        Err(e) => {
            tracing::warn!(
                handle = %handle,
                error = %e,
                "paid api primary failed, trying secondary"
            );
            attempts.push(Attempt::failed(METHOD_PRIMARY, e));
        }
    }

    match fetch_secondary(ctx, key, &handle, options.max_tweets).await {
        Ok(tweets) if !tweets.is_empty() => {
            attempts.push(Attempt::fetched(METHOD_SECONDARY, tweets.len()));
            ScrapeResult::ok(filter_tweets(tweets, options), METHOD_SECONDARY, attempts)
        }
        Ok(_) => {
            attempts.push(Attempt::failed(METHOD_SECONDARY, StrategyError::Empty));
            ScrapeResult::failed(summarize_failures(&attempts), METHOD, attempts)
        }
        Err(e) => {
            attempts.push(Attempt::failed(METHOD_SECONDARY, e));
            ScrapeResult::failed(summarize_failures(&attempts), METHOD, attempts)
        }
    }
}

pub fn map_primary_profile(v: &Value) -> Option<ScrapedProfile> {
    let handle = str_at(v, "/userName")?;
    Some(ScrapedProfile {
        name: str_at(v, "/name").unwrap_or_else(|| handle.clone()),
        bio: decode_attr(&str_at(v, "/description").unwrap_or_default()),
        avatar_url: str_at(v, "/profilePicture"),
        followers: u64_at(v, "/followers"),
        following: u64_at(v, "/following"),
        tweet_count: u64_at(v, "/statusesCount"),
        verified: bool_at(v, "/isBlueVerified") || bool_at(v, "/isVerified"),
        user_id: str_at(v, "/id"),
        handle,
    })
}

async fn fetch_primary_profile(
    ctx: &StrategyContext<'_>,
    key: &str,
    handle: &str,
) -> Result<ScrapedProfile, StrategyError> {
    let root = primary_get(ctx, key, "/twitter/user/info", handle).await?;
    object_at(&root, "/data")
        .and_then(map_primary_profile)
        .ok_or(StrategyError::Empty)
}

pub async fn fetch_profile(ctx: &StrategyContext<'_>, handle: &str) -> ProfileResult {
    let Some(key) = ctx.credentials.api_key() else {
        return ProfileResult::from_error(METHOD, not_configured());
    };
    match fetch_primary_profile(ctx, key, handle.trim().trim_start_matches('@')).await {
        Ok(p) => ProfileResult::ok(p, METHOD_PRIMARY, vec![Attempt::fetched(METHOD_PRIMARY, 1)]),
        Err(e) => ProfileResult::from_error(METHOD_PRIMARY, e),
    }
}
