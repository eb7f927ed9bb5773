// src/scrape/filter.rs
use crate::parse::metric::matches_keywords;
use crate::scrape::types::{ScrapeOptions, ScrapedTweet};

/// Drop records whose id cannot be recovered from their URL.
pub fn retain_resolvable(tweets: Vec<ScrapedTweet>) -> Vec<ScrapedTweet> {
    tweets.into_iter().filter(|t| t.has_resolvable_id()).collect()
}

fn keep(t: &ScrapedTweet, options: &ScrapeOptions) -> bool {
    if !options.include_replies && t.is_reply() {
        return false;
    }
    if !options.include_retweets && t.is_retweet {
        return false;
    }
    if !matches_keywords(&t.content, &options.keywords) {
        return false;
    }
    if let Some(since) = options.since_date {
        if t.posted_at < since {
            return false;
        }
    }
    true
}

/// Predicate filters first, truncation to `max_tweets` last, so the cap is
/// filled from whatever survives filtering.
pub fn filter_tweets(tweets: Vec<ScrapedTweet>, options: &ScrapeOptions) -> Vec<ScrapedTweet> {
    let mut out: Vec<ScrapedTweet> = retain_resolvable(tweets)
        .into_iter()
        .filter(|t| keep(t, options))
        .collect();
    out.truncate(options.max_tweets);
    out
}
