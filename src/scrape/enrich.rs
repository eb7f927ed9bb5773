// src/scrape/enrich.rs
//! Merge secondary-source records into primary ones. A field is only
//! overwritten when the secondary value is present; known values are never
//! downgraded to zero or blank.

use std::collections::HashMap;

use crate::scrape::types::ScrapedTweet;

fn take_count(base: &mut u64, extra: u64) {
    if extra > 0 {
        *base = extra;
    }
}

pub fn merge_enrichment(base: &mut ScrapedTweet, extra: &ScrapedTweet) {
    if !extra.content.trim().is_empty() {
        base.content = extra.content.clone();
        if base.content.starts_with("RT @") {
            base.is_retweet = true;
        }
    }
    if !extra.author_name.trim().is_empty() {
        base.author_name = extra.author_name.clone();
    }

    take_count(&mut base.metrics.likes, extra.metrics.likes);
    take_count(&mut base.metrics.retweets, extra.metrics.retweets);
    take_count(&mut base.metrics.replies, extra.metrics.replies);
    take_count(&mut base.metrics.quotes, extra.metrics.quotes);
    match (base.metrics.views, extra.metrics.views) {
        (_, Some(v)) if v > 0 => base.metrics.views = Some(v),
        (None, Some(0)) => base.metrics.views = Some(0),
        _ => {}
    }

    if base.media_urls.is_empty() && !extra.media_urls.is_empty() {
        base.media_urls = extra.media_urls.clone();
    }
    if base.quoted_tweet_url.is_none() && extra.quoted_tweet_url.is_some() {
        base.quoted_tweet_url = extra.quoted_tweet_url.clone();
        base.is_quote = true;
    }
}

/// Apply every hit in `enriched` (keyed by tweet id); returns how many merged.
pub fn apply_enrichment(
    tweets: &mut [ScrapedTweet],
    enriched: &HashMap<String, ScrapedTweet>,
) -> usize {
    let mut merged = 0;
    for t in tweets.iter_mut() {
        if let Some(extra) = enriched.get(&t.id) {
            merge_enrichment(t, extra);
            merged += 1;
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::types::TweetMetrics;
    use chrono::Utc;

    fn tweet(content: &str, likes: u64, views: Option<u64>) -> ScrapedTweet {
        ScrapedTweet {
            id: "1".into(),
            url: ScrapedTweet::canonical_url("kol", "1"),
            content: content.into(),
            author_handle: "kol".into(),
            author_name: String::new(),
            posted_at: Utc::now(),
            metrics: TweetMetrics {
                likes,
                views,
                ..Default::default()
            },
            media_urls: vec![],
            is_retweet: false,
            is_quote: false,
            quoted_tweet_url: None,
        }
    }

    #[test]
    fn zero_never_overwrites_known_metric() {
        let mut base = tweet("gm", 10, None);
        let extra = tweet("", 0, None);
        merge_enrichment(&mut base, &extra);
        assert_eq!(base.metrics.likes, 10);
        assert_eq!(base.content, "gm");
    }

    #[test]
    fn non_zero_values_win() {
        let mut base = tweet("gm trunc…", 10, None);
        let mut extra = tweet("gm full text", 25, Some(900));
        extra.author_name = "KOL".into();
        merge_enrichment(&mut base, &extra);
        assert_eq!(base.metrics.likes, 25);
        assert_eq!(base.metrics.views, Some(900));
        assert_eq!(base.content, "gm full text");
        assert_eq!(base.author_name, "KOL");
    }

    #[test]
    fn views_tri_state() {
        // unknown -> known zero is an upgrade
        let mut base = tweet("gm", 1, None);
        merge_enrichment(&mut base, &tweet("", 0, Some(0)));
        assert_eq!(base.metrics.views, Some(0));

        // known value is not replaced by zero or unknown
        let mut base = tweet("gm", 1, Some(50));
        merge_enrichment(&mut base, &tweet("", 0, Some(0)));
        merge_enrichment(&mut base, &tweet("", 0, None));
        assert_eq!(base.metrics.views, Some(50));
    }

    #[test]
    fn retweet_prefix_in_merged_text_marks_retweet() {
        let mut base = tweet("big news", 1, None);
        merge_enrichment(&mut base, &tweet("RT @other: big news", 0, None));
        assert!(base.is_retweet);

        let mut base = tweet("gm", 1, None);
        merge_enrichment(&mut base, &tweet("gm frens", 0, None));
        assert!(!base.is_retweet);
    }

    #[test]
    fn apply_counts_hits() {
        let mut tweets = vec![tweet("gm", 1, None)];
        let mut map = HashMap::new();
        assert_eq!(apply_enrichment(&mut tweets, &map), 0);
        map.insert("1".to_string(), tweet("", 7, None));
        assert_eq!(apply_enrichment(&mut tweets, &map), 1);
        assert_eq!(tweets[0].metrics.likes, 7);
    }
}
