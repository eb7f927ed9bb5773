// src/parse/html.rs
//! Mirror HTML -> records. Field extraction is driven by a `TimelineSchema`;
//! this module only slices the page, decodes, and assembles.

use std::collections::HashSet;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::parse::metric::{parse_date, parse_metric_number, parse_relative_time};
use crate::parse::schema::{profile_schema, TimelineSchema};
use crate::parse::text::{clean_text, decode_attr};
use crate::scrape::types::{ScrapedProfile, ScrapedTweet, TweetMetrics};

static RE_STATUS_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|/)([A-Za-z0-9_]{1,15})/status/(\d+)").expect("status path regex")
});

/// `(handle, id)` from `/user/status/123#m` or a full URL on any host.
pub fn status_parts(link: &str) -> Option<(String, String)> {
    RE_STATUS_PATH
        .captures(link)
        .map(|c| (c[1].to_string(), c[2].to_string()))
}

/// Mirror-relative paths (`/pic/...`) become absolute against the mirror base.
pub fn absolutize(base_url: &str, href: &str) -> String {
    let href = decode_attr(href);
    if href.starts_with("http://") || href.starts_with("https://") {
        href
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

fn split_items<'a>(html: &'a str, schema: &TimelineSchema) -> Vec<&'a str> {
    let starts: Vec<usize> = schema.item_start.find_iter(html).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(html.len());
            &html[start..end]
        })
        .filter(|block| {
            let head_end = block.find('>').unwrap_or(block.len());
            !schema.skip_item.is_match(&block[..head_end])
        })
        .collect()
}

fn parse_item(block: &str, base_url: &str, schema: &TimelineSchema) -> Option<ScrapedTweet> {
    let link = schema.link.first(block)?;
    let (link_handle, id) = status_parts(link)?;

    let content = clean_text(schema.content.first(block)?);
    if content.is_empty() {
        return None;
    }

    let author_handle = schema
        .username
        .first(block)
        .map(|u| decode_attr(u).trim_start_matches('@').to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| link_handle.clone());
    let author_name = schema
        .fullname
        .first(block)
        .map(decode_attr)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| author_handle.clone());

    let posted_at = schema
        .date_title
        .first(block)
        .and_then(|t| parse_date(&decode_attr(t)))
        .or_else(|| {
            schema
                .date_text
                .first(block)
                .map(|t| parse_relative_time(&decode_attr(t)))
        })
        .unwrap_or_else(Utc::now);

    let metrics = TweetMetrics {
        likes: schema.likes.first(block).map(parse_metric_number).unwrap_or(0),
        retweets: schema.retweets.first(block).map(parse_metric_number).unwrap_or(0),
        replies: schema.replies.first(block).map(parse_metric_number).unwrap_or(0),
        quotes: schema.quotes.first(block).map(parse_metric_number).unwrap_or(0),
        views: schema.views.first(block).map(parse_metric_number),
    };

    let media_urls = schema
        .media
        .all(block)
        .into_iter()
        .map(|m| absolutize(base_url, m))
        .collect();

    let quoted_tweet_url = schema
        .quote_link
        .first(block)
        .and_then(status_parts)
        .filter(|(_, qid)| *qid != id)
        .map(|(h, qid)| ScrapedTweet::canonical_url(&h, &qid));

    let is_retweet = schema.retweet_marker.is_match(block)
        || content.to_ascii_lowercase().starts_with("rt @");

    Some(ScrapedTweet {
        url: ScrapedTweet::canonical_url(&link_handle, &id),
        id,
        content,
        author_handle,
        author_name,
        posted_at,
        metrics,
        media_urls,
        is_retweet,
        is_quote: quoted_tweet_url.is_some(),
        quoted_tweet_url,
    })
}

/// Parse a mirror timeline page. Blocks without a status link or without
/// content are skipped; duplicate ids (pinned tweets) keep the first copy.
pub fn parse_timeline_html(
    html: &str,
    base_url: &str,
    schema: &TimelineSchema,
) -> Vec<ScrapedTweet> {
    let mut seen = HashSet::new();
    split_items(html, schema)
        .into_iter()
        .filter_map(|block| parse_item(block, base_url, schema))
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}

/// Parse the profile header of a mirror timeline page.
pub fn parse_profile_html(html: &str, base_url: &str) -> Option<ScrapedProfile> {
    let schema = profile_schema();
    let handle = schema
        .username
        .first(html)
        .map(|u| decode_attr(u).trim_start_matches('@').to_string())
        .filter(|u| !u.is_empty())?;
    let name = schema
        .fullname
        .first(html)
        .map(decode_attr)
        .unwrap_or_else(|| handle.clone());

    let count = |field: &crate::parse::schema::FieldPatterns| {
        field
            .first(html)
            .map(|v| decode_attr(v))
            .filter(|v| !v.is_empty())
            .map(|v| parse_metric_number(&v))
    };

    Some(ScrapedProfile {
        name,
        bio: schema.bio.first(html).map(clean_text).unwrap_or_default(),
        avatar_url: schema.avatar.first(html).map(|a| absolutize(base_url, a)),
        followers: count(&schema.followers),
        following: count(&schema.following),
        tweet_count: count(&schema.tweets),
        verified: schema.verified.is_match(html),
        user_id: None,
        handle,
    })
}
