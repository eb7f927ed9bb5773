// src/scrape/strategies/direct.rs
//! Logged-in web-client tier: resolve the handle to a numeric user id, then
//! page the user's timeline. Both calls replay the headers the platform's own
//! web client sends, using the caller's session cookies.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::{
    array_at, bool_at, object_at, parse_json, str_at, u64_at, url_with_params, StrategyContext,
};
use crate::parse::metric::parse_date;
use crate::parse::text::decode_attr;
use crate::scrape::filter::filter_tweets;
use crate::scrape::http::HttpRequest;
use crate::scrape::types::{
    Attempt, ProfileResult, ScrapeOptions, ScrapeResult, ScrapedProfile, ScrapedTweet,
    StrategyError, TweetMetrics,
};

pub const METHOD: &str = "direct-session";

static RE_CT0: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|;\s*)ct0=([^;\s]+)").expect("ct0 regex"));

/// CSRF token: explicit one first, otherwise the `ct0` cookie.
pub fn csrf_from(cookies: &str, explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| RE_CT0.captures(cookies).map(|c| c[1].to_string()))
}

struct Session<'c> {
    cookies: &'c str,
    csrf: Option<String>,
}

fn session<'c>(ctx: &'c StrategyContext<'_>) -> Result<Session<'c>, StrategyError> {
    let cookies = ctx
        .credentials
        .cookies()
        .ok_or_else(|| StrategyError::NotConfigured("session cookies".to_string()))?;
    Ok(Session {
        cookies,
        csrf: csrf_from(cookies, ctx.credentials.csrf_token()),
    })
}

fn graphql_request(ctx: &StrategyContext<'_>, s: &Session<'_>, url: String) -> HttpRequest {
    let cfg = &ctx.config.direct_session;
    let mut req = HttpRequest::get(url, ctx.config.timeouts.api())
        .header("Authorization", format!("Bearer {}", cfg.bearer_token))
        .header("Cookie", s.cookies)
        .header("x-twitter-auth-type", "OAuth2Session")
        .header("x-twitter-active-user", "yes")
        .header("x-twitter-client-language", "en")
        .header("Referer", "https://x.com/");
    if let Some(csrf) = &s.csrf {
        req = req.header("x-csrf-token", csrf.as_str());
    }
    req
}

fn graphql_url(
    ctx: &StrategyContext<'_>,
    query_id: &str,
    op: &str,
    variables: &Value,
) -> Result<String, StrategyError> {
    let cfg = &ctx.config.direct_session;
    let base = format!("{}/{query_id}/{op}", cfg.graphql_base.trim_end_matches('/'));
    let features =
        serde_json::to_string(&cfg.features).map_err(|e| StrategyError::Parse(e.to_string()))?;
    let variables = variables.to_string();
    url_with_params(
        &base,
        &[("variables", variables.as_str()), ("features", features.as_str())],
    )
}

/// `data.user.result` of a UserByScreenName payload.
pub fn map_user(result: &Value) -> Option<ScrapedProfile> {
    let legacy = object_at(result, "/legacy")?;
    let handle = str_at(legacy, "/screen_name").or_else(|| str_at(result, "/core/screen_name"))?;
    Some(ScrapedProfile {
        name: str_at(legacy, "/name")
            .or_else(|| str_at(result, "/core/name"))
            .unwrap_or_else(|| handle.clone()),
        bio: decode_attr(&str_at(legacy, "/description").unwrap_or_default()),
        avatar_url: str_at(legacy, "/profile_image_url_https")
            .or_else(|| str_at(result, "/avatar/image_url")),
        followers: u64_at(legacy, "/followers_count"),
        following: u64_at(legacy, "/friends_count"),
        tweet_count: u64_at(legacy, "/statuses_count"),
        verified: bool_at(result, "/is_blue_verified") || bool_at(legacy, "/verified"),
        user_id: str_at(result, "/rest_id"),
        handle,
    })
}

/// Unwrap `TweetWithVisibilityResults` and friends down to the tweet object.
fn unwrap_tweet(result: &Value) -> Option<&Value> {
    match str_at(result, "/__typename").as_deref() {
        Some("TweetWithVisibilityResults") => object_at(result, "/tweet"),
        Some("TweetTombstone") | Some("TweetUnavailable") => None,
        _ => object_at(result, "/legacy").map(|_| result),
    }
}

fn author_of(tweet: &Value) -> (String, String) {
    let user = tweet.pointer("/core/user_results/result").unwrap_or(&Value::Null);
    let handle = str_at(user, "/legacy/screen_name")
        .or_else(|| str_at(user, "/core/screen_name"))
        .unwrap_or_default();
    let name = str_at(user, "/legacy/name")
        .or_else(|| str_at(user, "/core/name"))
        .unwrap_or_else(|| handle.clone());
    (handle, name)
}

/// One `tweet_results.result` object.
pub fn map_graphql_tweet(result: &Value) -> Option<ScrapedTweet> {
    let tweet = unwrap_tweet(result)?;
    let legacy = object_at(tweet, "/legacy")?;
    let id = str_at(tweet, "/rest_id").or_else(|| str_at(legacy, "/id_str"))?;
    let (author_handle, author_name) = author_of(tweet);

    // Long posts carry their full text outside `legacy`.
    let raw = str_at(tweet, "/note_tweet/note_tweet_results/result/text")
        .or_else(|| str_at(legacy, "/full_text"))
        .unwrap_or_default();
    let content = decode_attr(&raw);

    let media = if legacy.pointer("/extended_entities/media").is_some() {
        array_at(legacy, "/extended_entities/media")
    } else {
        array_at(legacy, "/entities/media")
    };
    let media_urls = media.iter().filter_map(|m| str_at(m, "/media_url_https")).collect();

    let quoted_tweet_url = tweet
        .pointer("/quoted_status_result/result")
        .and_then(unwrap_tweet)
        .and_then(|q| {
            let qid = str_at(q, "/rest_id")?;
            let (qhandle, _) = author_of(q);
            Some(ScrapedTweet::canonical_url(&qhandle, &qid))
        })
        .or_else(|| {
            str_at(legacy, "/quoted_status_id_str")
                .map(|qid| ScrapedTweet::canonical_url("i", &qid))
        });

    let is_retweet = legacy.pointer("/retweeted_status_result/result").is_some()
        || content.to_ascii_lowercase().starts_with("rt @");

    Some(ScrapedTweet {
        url: ScrapedTweet::canonical_url(&author_handle, &id),
        author_handle,
        author_name,
        posted_at: str_at(legacy, "/created_at")
            .and_then(|d| parse_date(&d))
            .unwrap_or_else(chrono::Utc::now),
        metrics: TweetMetrics {
            likes: u64_at(legacy, "/favorite_count").unwrap_or(0),
            retweets: u64_at(legacy, "/retweet_count").unwrap_or(0),
            replies: u64_at(legacy, "/reply_count").unwrap_or(0),
            quotes: u64_at(legacy, "/quote_count").unwrap_or(0),
            views: u64_at(tweet, "/views/count"),
        },
        content,
        media_urls,
        is_retweet,
        is_quote: quoted_tweet_url.is_some() || bool_at(legacy, "/is_quote_status"),
        quoted_tweet_url,
        id,
    })
}

fn entry_tweets(entry: &Value, out: &mut Vec<ScrapedTweet>) {
    if let Some(t) = entry
        .pointer("/content/itemContent/tweet_results/result")
        .and_then(map_graphql_tweet)
    {
        out.push(t);
    }
    // conversation modules
    for item in array_at(entry, "/content/items") {
        if let Some(t) = item
            .pointer("/item/itemContent/tweet_results/result")
            .and_then(map_graphql_tweet)
        {
            out.push(t);
        }
    }
}

/// Walk the timeline instructions of a UserTweets payload.
pub fn parse_user_tweets(root: &Value) -> Vec<ScrapedTweet> {
    let instructions = [
        "/data/user/result/timeline_v2/timeline/instructions",
        "/data/user/result/timeline/timeline/instructions",
    ]
    .iter()
    .map(|p| array_at(root, p))
    .find(|a| !a.is_empty())
    .unwrap_or(&[]);

    let mut out = Vec::new();
    for ins in instructions {
        match str_at(ins, "/type").as_deref() {
            Some("TimelinePinEntry") => {
                if let Some(entry) = object_at(ins, "/entry") {
                    entry_tweets(entry, &mut out);
                }
            }
            _ => {
                for entry in array_at(ins, "/entries") {
                    entry_tweets(entry, &mut out);
                }
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|t| seen.insert(t.id.clone()));
    out
}

async fn lookup_user(
    ctx: &StrategyContext<'_>,
    s: &Session<'_>,
    handle: &str,
) -> Result<ScrapedProfile, StrategyError> {
    let cfg = &ctx.config.direct_session;
    let vars = json!({"screen_name": handle, "withSafetyModeUserFields": true});
    let url = graphql_url(ctx, &cfg.user_by_screen_name_query_id, "UserByScreenName", &vars)?;
    let body = ctx.fetch_ok(graphql_request(ctx, s, url)).await?;
    let root = parse_json(&body)?;
    root.pointer("/data/user/result")
        .and_then(map_user)
        .filter(|p| p.user_id.is_some())
        .ok_or_else(|| StrategyError::Parse(format!("user @{handle} not resolved")))
}

async fn user_tweets(
    ctx: &StrategyContext<'_>,
    s: &Session<'_>,
    user_id: &str,
) -> Result<Vec<ScrapedTweet>, StrategyError> {
    let cfg = &ctx.config.direct_session;
    let vars = json!({
        "userId": user_id,
        "count": cfg.tweets_per_page,
        "includePromotedContent": false,
        "withQuickPromoteEligibilityTweetFields": false,
        "withVoice": true,
        "withV2Timeline": true,
    });
    let url = graphql_url(ctx, &cfg.user_tweets_query_id, "UserTweets", &vars)?;
    let body = ctx.fetch_ok(graphql_request(ctx, s, url)).await?;
    Ok(parse_user_tweets(&parse_json(&body)?))
}

pub async fn fetch_timeline(ctx: &StrategyContext<'_>, options: &ScrapeOptions) -> ScrapeResult {
    let s = match session(ctx) {
        Ok(s) => s,
        Err(e) => return ScrapeResult::from_error(METHOD, e),
    };
    let handle = options.clean_handle();

    let profile = match lookup_user(ctx, &s, &handle).await {
        Ok(p) => p,
        Err(e) => return ScrapeResult::from_error(METHOD, e),
    };
    let user_id = profile.user_id.unwrap_or_default();

    match user_tweets(ctx, &s, &user_id).await {
        Ok(tweets) if tweets.is_empty() => ScrapeResult::from_error(METHOD, StrategyError::Empty),
        Ok(tweets) => {
            let attempts = vec![Attempt::fetched(METHOD, tweets.len())];
            ScrapeResult::ok(filter_tweets(tweets, options), METHOD, attempts)
        }
        Err(e) => ScrapeResult::from_error(METHOD, e),
    }
}

pub async fn fetch_profile(ctx: &StrategyContext<'_>, handle: &str) -> ProfileResult {
    let s = match session(ctx) {
        Ok(s) => s,
        Err(e) => return ProfileResult::from_error(METHOD, e),
    };
    match lookup_user(ctx, &s, handle.trim().trim_start_matches('@')).await {
        Ok(p) => ProfileResult::ok(p, METHOD, vec![Attempt::fetched(METHOD, 1)]),
        Err(e) => ProfileResult::from_error(METHOD, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet_result(id: &str, text: &str) -> Value {
        json!({
            "__typename": "Tweet",
            "rest_id": id,
            "core": {"user_results": {"result": {"legacy": {"screen_name": "kol", "name": "KOL"}}}},
            "views": {"count": "1200", "state": "EnabledWithCount"},
            "legacy": {
                "full_text": text,
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "favorite_count": 15, "retweet_count": 3, "reply_count": 1, "quote_count": 0,
                "extended_entities": {"media": [{"media_url_https": "https://pbs.twimg.com/media/x.jpg"}]}
            }
        })
    }

    #[test]
    fn ct0_is_used_as_csrf_fallback() {
        assert_eq!(csrf_from("auth_token=a; ct0=abc123; lang=en", None).as_deref(), Some("abc123"));
        assert_eq!(csrf_from("ct0=abc", Some("explicit")).as_deref(), Some("explicit"));
        assert_eq!(csrf_from("auth_token=a", None), None);
    }

    #[test]
    fn maps_tweet_and_visibility_wrapper() {
        let t = map_graphql_tweet(&tweet_result("100", "gm &amp; gn")).unwrap();
        assert_eq!(t.content, "gm & gn");
        assert_eq!(t.metrics.views, Some(1200));
        assert_eq!(t.metrics.likes, 15);
        assert_eq!(t.url, "https://x.com/kol/status/100");
        assert_eq!(t.media_urls.len(), 1);

        let wrapped = json!({
            "__typename": "TweetWithVisibilityResults",
            "tweet": tweet_result("101", "hi")
        });
        assert_eq!(map_graphql_tweet(&wrapped).unwrap().id, "101");
        assert!(map_graphql_tweet(&json!({"__typename": "TweetTombstone"})).is_none());
    }

    #[test]
    fn walks_entries_pins_and_modules() {
        let entry =
            |r: Value| json!({"content": {"itemContent": {"tweet_results": {"result": r}}}});
        let root = json!({"data": {"user": {"result": {"timeline_v2": {"timeline": {"instructions": [
            {"type": "TimelinePinEntry", "entry": entry(tweet_result("1", "pinned"))},
            {"type": "TimelineAddEntries", "entries": [
                entry(tweet_result("2", "second")),
                entry(tweet_result("1", "pinned again")),
                {"content": {"items": [
                    {"item": {"itemContent": {"tweet_results": {"result": tweet_result("3", "in module")}}}}
                ]}},
                {"content": {"cursorType": "Bottom", "value": "abc"}}
            ]}
        ]}}}}}});
        let ids: Vec<String> = parse_user_tweets(&root).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn note_tweet_text_wins() {
        let mut r = tweet_result("5", "truncated…");
        r["note_tweet"] = json!({"note_tweet_results": {"result": {"text": "the full long post"}}});
        assert_eq!(map_graphql_tweet(&r).unwrap().content, "the full long post");
    }

    #[test]
    fn maps_user_payload() {
        let user = json!({
            "rest_id": "44196397", "is_blue_verified": true,
            "legacy": {"screen_name": "kol", "name": "KOL", "description": "bio",
                       "followers_count": 10, "friends_count": 2, "statuses_count": 99}
        });
        let p = map_user(&user).unwrap();
        assert_eq!(p.user_id.as_deref(), Some("44196397"));
        assert_eq!(p.following, Some(2));
        assert!(p.verified);
    }
}
