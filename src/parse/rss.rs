// src/parse/rss.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::histogram;
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::parse::html::{absolutize, status_parts};
use crate::parse::metric::parse_date;
use crate::parse::text::{clean_text, decode_attr};
use crate::scrape::types::{ScrapedTweet, TweetMetrics};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
}

static RE_IMG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img[^>]*src="([^"]+)""#).expect("img regex"));
static RE_STATUS_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="([^"]*/status/\d+[^"]*)""#).expect("status href regex"));
static RE_RT_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i)RT by @?[A-Za-z0-9_]+:\s*").expect("rt-by regex"));

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0))
        .or_else(|| parse_date(ts))
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

fn parse_item(it: Item, base_url: &str) -> Option<ScrapedTweet> {
    let link = it.link.as_deref().or(it.guid.as_deref())?;
    let (link_handle, id) = status_parts(link)?;

    let title_raw = it.title.as_deref().map(decode_attr).unwrap_or_default();
    let description = it.description.unwrap_or_default();

    let retweet_by = RE_RT_BY.is_match(&title_raw);
    let title = RE_RT_BY.replace(&title_raw, "").trim().to_string();
    let content = if !title.is_empty() {
        title
    } else {
        clean_text(&description)
    };
    if content.is_empty() {
        return None;
    }

    let author_handle = it
        .creator
        .as_deref()
        .map(|c| c.trim().trim_start_matches('@').to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| link_handle.clone());

    let media_urls = RE_IMG
        .captures_iter(&description)
        .map(|c| absolutize(base_url, &c[1]))
        .collect();

    let quoted_tweet_url = RE_STATUS_HREF
        .captures_iter(&description)
        .filter_map(|c| status_parts(&c[1]))
        .find(|(_, qid)| *qid != id)
        .map(|(h, qid)| ScrapedTweet::canonical_url(&h, &qid));

    let is_retweet = retweet_by || content.to_ascii_lowercase().starts_with("rt @");

    Some(ScrapedTweet {
        url: ScrapedTweet::canonical_url(&link_handle, &id),
        id,
        content,
        author_name: author_handle.clone(),
        author_handle,
        posted_at: it
            .pub_date
            .as_deref()
            .and_then(parse_rfc2822)
            .unwrap_or_else(Utc::now),
        metrics: TweetMetrics::default(),
        media_urls,
        is_retweet,
        is_quote: quoted_tweet_url.is_some(),
        quoted_tweet_url,
    })
}

/// Parse a mirror RSS feed. RSS carries no engagement counts, so metrics stay
/// at their defaults (views unknown) until enrichment fills them in.
pub fn parse_timeline_rss(xml: &str, base_url: &str) -> Result<Vec<ScrapedTweet>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing mirror rss xml")?;

    let mut seen = std::collections::HashSet::new();
    let out: Vec<ScrapedTweet> = rss
        .channel
        .item
        .into_iter()
        .filter_map(|it| parse_item(it, base_url))
        .filter(|t| seen.insert(t.id.clone()))
        .collect();

    histogram!("scrape_parse_ms", "format" => "rss").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}
