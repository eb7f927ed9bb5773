// tests/orchestrator.rs
//
// End-to-end tier ordering over a canned HTTP client. No sockets are opened:
// every upstream URL is answered (or refused) by StaticHttpClient.

use std::sync::Arc;

use kol_scraper::config::{MirrorConfig, ScraperConfig};
use kol_scraper::scrape::http::StaticHttpClient;
use kol_scraper::{AttemptOutcome, Credentials, ScrapeOptions, Scraper, StrategyError};

const TIMELINE_HTML: &str = include_str!("fixtures/nitter_timeline.html");
const TIMELINE_RSS: &str = include_str!("fixtures/nitter_rss.xml");
const RATE_LIMITED: &str = include_str!("fixtures/rate_limited.html");
const PAID_LAST_TWEETS: &str = include_str!("fixtures/paid_last_tweets.json");
const GQL_USER: &str = include_str!("fixtures/graphql_user.json");
const GQL_USER_TWEETS: &str = include_str!("fixtures/graphql_user_tweets.json");
const SYNDICATION_TWEET: &str = include_str!("fixtures/syndication_tweet.json");

const SYND_1801: &str = "https://synd.test/tweet-result?id=1801000000000000001";
const GQL_USER_URL: &str = "https://gql.test/graphql/G3KGOASz96M-Qu0nwmGXNg/UserByScreenName";
const GQL_TWEETS_URL: &str = "https://gql.test/graphql/E3opETHurmVJflFsUBVuUQ/UserTweets";

fn test_config() -> ScraperConfig {
    let mut cfg = ScraperConfig::default();
    cfg.mirrors = ["https://m1.test", "https://m2.test", "https://m3.test"]
        .into_iter()
        .map(MirrorConfig::new)
        .collect();
    cfg.paid_api.primary_base = "https://paid.test".into();
    cfg.paid_api.secondary_base = "https://v2.test".into();
    cfg.direct_session.graphql_base = "https://gql.test/graphql".into();
    cfg.syndication.base_url = "https://synd.test".into();
    cfg.batch.delay_ms = 0;
    cfg
}

fn build(http: StaticHttpClient) -> (Arc<StaticHttpClient>, Scraper) {
    let http = Arc::new(http);
    let scraper = Scraper::new(http.clone(), Arc::new(test_config()));
    (http, scraper)
}

fn opts() -> ScrapeOptions {
    ScrapeOptions::new("cryptokol")
}

fn methods(attempts: &[kol_scraper::Attempt]) -> Vec<&str> {
    attempts.iter().map(|a| a.method.as_str()).collect()
}

#[tokio::test]
async fn falls_through_rate_limited_mirrors_to_third() {
    let (http, scraper) = build(
        StaticHttpClient::new()
            .route("https://m1.test/", 429, "Too Many Requests")
            .route("https://m2.test/", 429, "Too Many Requests")
            .route("https://m3.test/", 200, TIMELINE_HTML),
    );

    let res = scraper.scrape_tweets(&opts()).await;

    assert!(res.success, "error: {:?}", res.error);
    assert_eq!(res.method, "nitter:m3.test");
    // 5 parsed, reply dropped by default
    assert_eq!(res.tweets.len(), 4);
    assert!(res.tweets.iter().all(|t| !t.content.starts_with('@')));
    assert_eq!(
        methods(&res.attempts),
        vec!["paid-api", "direct-session", "nitter:m1.test", "nitter:m2.test", "nitter:m3.test"]
    );
    assert!(matches!(
        res.attempts[0].error(),
        Some(StrategyError::NotConfigured(_))
    ));
    assert_eq!(res.attempts[2].error(), Some(&StrategyError::Http { status: 429 }));
    assert_eq!(res.attempts[4].outcome, AttemptOutcome::Fetched { count: 5 });
    assert!(http.calls().iter().all(|u| !u.ends_with("/rss")));
}

#[tokio::test]
async fn banner_page_counts_as_instance_failure() {
    let (_, scraper) = build(
        StaticHttpClient::new()
            .route("https://m1.test/", 200, RATE_LIMITED)
            .route("https://m2.test/", 200, TIMELINE_HTML),
    );

    let res = scraper.scrape_tweets(&opts()).await;

    assert_eq!(res.method, "nitter:m2.test");
    assert!(matches!(res.attempts[2].error(), Some(StrategyError::Blocked(_))));
}

#[tokio::test]
async fn timed_out_mirror_falls_through_to_next() {
    let (_, scraper) = build(
        StaticHttpClient::new()
            .route_error("https://m1.test/", StrategyError::Timeout { after_secs: 15 })
            .route("https://m2.test/", 200, TIMELINE_HTML),
    );

    let res = scraper.scrape_tweets(&opts()).await;

    assert!(res.success, "error: {:?}", res.error);
    assert_eq!(res.method, "nitter:m2.test");
    assert_eq!(
        res.attempts[2].error(),
        Some(&StrategyError::Timeout { after_secs: 15 })
    );
    assert_eq!(res.attempts[3].outcome, AttemptOutcome::Fetched { count: 5 });
}

#[tokio::test]
async fn short_page_counts_as_instance_failure() {
    let (_, scraper) = build(
        StaticHttpClient::new()
            .route("https://m1.test/", 200, "<html><body></body></html>")
            .route("https://m2.test/", 200, TIMELINE_HTML),
    );

    let res = scraper.scrape_tweets(&opts()).await;

    assert_eq!(res.method, "nitter:m2.test");
    assert!(matches!(res.attempts[2].error(), Some(StrategyError::Blocked(_))));
}

#[tokio::test]
async fn mirror_results_are_enriched_without_downgrades() {
    let (http, scraper) = build(
        StaticHttpClient::new()
            .route("https://m1.test/", 200, TIMELINE_HTML)
            .route(SYND_1801, 200, SYNDICATION_TWEET),
    );

    let res = scraper.scrape_tweets(&opts()).await;
    assert_eq!(res.method, "nitter:m1.test");

    let enriched = res
        .tweets
        .iter()
        .find(|t| t.id == "1801000000000000001")
        .expect("first tweet present");
    assert_eq!(enriched.content, "gm frens, $SOL looking strong. Full thread below");
    assert_eq!(enriched.metrics.likes, 5120);
    assert_eq!(enriched.metrics.replies, 64);
    // syndication has no retweet or view counts; mirror values stay
    assert_eq!(enriched.metrics.retweets, 45);
    assert_eq!(enriched.metrics.views, Some(25_300));

    let untouched = res
        .tweets
        .iter()
        .find(|t| t.id == "1805000000000000005")
        .expect("last tweet present");
    assert_eq!(untouched.metrics.likes, 311);

    let synd_calls = http.calls().iter().filter(|u| u.starts_with("https://synd.test/")).count();
    assert_eq!(synd_calls, 4, "one lookup per returned tweet");
}

/// Syndication body for `id` with the given full text.
fn syndication_body(id: &str, text: &str) -> String {
    SYNDICATION_TWEET
        .replace("1801000000000000001", id)
        .replace("gm frens, $SOL looking strong. Full thread below", text)
}

#[tokio::test]
async fn enriched_reply_mention_is_filtered_out() {
    // the mirror renders the reply mention outside the tweet body
    let body = syndication_body(
        "1805000000000000005",
        "@bob New thread on airdrop farming & strategy",
    );
    let (_, scraper) = build(
        StaticHttpClient::new()
            .route("https://m1.test/", 200, TIMELINE_HTML)
            .route("https://synd.test/tweet-result?id=1805000000000000005", 200, body),
    );

    let res = scraper.scrape_tweets(&opts()).await;

    assert!(res.success, "error: {:?}", res.error);
    assert_eq!(res.tweets.len(), 3);
    assert!(res.tweets.iter().all(|t| !t.content.starts_with('@')));
    assert!(res.tweets.iter().all(|t| t.id != "1805000000000000005"));

    let mut with_replies = opts();
    with_replies.include_replies = true;
    let res = scraper.scrape_tweets(&with_replies).await;
    assert!(res
        .tweets
        .iter()
        .any(|t| t.content == "@bob New thread on airdrop farming & strategy"));
}

#[tokio::test]
async fn enriched_retweet_prefix_respects_retweet_filter() {
    let body = syndication_body("1801000000000000001", "RT @other: gm frens, $SOL looking strong");
    let (_, scraper) = build(
        StaticHttpClient::new()
            .route("https://m1.test/", 200, TIMELINE_HTML)
            .route(SYND_1801, 200, body),
    );
    let mut options = opts();
    options.include_retweets = false;

    let res = scraper.scrape_tweets(&options).await;

    assert!(res.success);
    assert!(res.tweets.iter().all(|t| !t.is_retweet));
    assert!(res.tweets.iter().all(|t| t.id != "1801000000000000001"));
}

#[tokio::test]
async fn enriched_text_is_rechecked_against_keywords() {
    // only 1801 mentions $SOL; its full text no longer does
    let body = syndication_body("1801000000000000001", "gm frens, looking strong");
    let (_, scraper) = build(
        StaticHttpClient::new()
            .route("https://m1.test/", 200, TIMELINE_HTML)
            .route(SYND_1801, 200, body),
    );
    let options = opts().with_keywords(vec!["$sol".into()]);

    let res = scraper.scrape_tweets(&options).await;

    assert!(res.success);
    assert!(res.tweets.is_empty());
    assert!(res.error.is_none());
}

#[tokio::test]
async fn enrichment_is_capped_by_config() {
    let http = Arc::new(StaticHttpClient::new().route("https://m1.test/", 200, TIMELINE_HTML));
    let mut cfg = test_config();
    cfg.syndication.enrichment_limit = 2;
    let scraper = Scraper::new(http.clone(), Arc::new(cfg));

    let res = scraper.scrape_tweets(&opts()).await;

    assert_eq!(res.tweets.len(), 4);
    let synd_calls = http.calls().iter().filter(|u| u.starts_with("https://synd.test/")).count();
    assert_eq!(synd_calls, 2);
}

#[tokio::test]
async fn rss_tier_runs_when_every_html_page_fails() {
    let (_, scraper) = build(
        StaticHttpClient::new()
            .route("https://m1.test/", 503, "")
            .route("https://m2.test/", 503, "")
            .route("https://m3.test/", 503, "")
            .route("https://m2.test/cryptokol/rss", 200, TIMELINE_RSS),
    );

    let res = scraper.scrape_tweets(&opts()).await;

    assert!(res.success);
    assert_eq!(res.method, "nitter-rss:m2.test");
    assert_eq!(res.tweets.len(), 3);
    assert!(res.tweets.iter().all(|t| t.metrics.views.is_none()));
    assert!(methods(&res.attempts).contains(&"nitter-rss:m1.test"));
}

#[tokio::test]
async fn paid_api_wins_when_key_is_supplied() {
    let (http, scraper) = build(
        StaticHttpClient::new()
            .route("https://paid.test/twitter/user/last_tweets", 200, PAID_LAST_TWEETS)
            .route("https://m1.test/", 200, TIMELINE_HTML),
    );
    let creds = Credentials {
        api_key: Some("k".into()),
        ..Default::default()
    };

    let res = scraper.scrape_tweets_with(&opts(), &creds).await;

    assert_eq!(res.method, "paid-api:primary");
    assert_eq!(res.tweets.len(), 1, "reply filtered out");
    let t = &res.tweets[0];
    assert_eq!(t.content, "Accumulating $SOL under 150 & not selling");
    assert_eq!(t.metrics.views, Some(180_000));
    assert_eq!(res.attempts.len(), 1);
    assert!(http.calls().iter().all(|u| !u.starts_with("https://m1.test/")));
    assert!(http.calls().iter().all(|u| !u.starts_with("https://synd.test/")));
}

#[tokio::test]
async fn paid_api_falls_back_to_secondary_endpoint() {
    let v2 = r#"{
        "data": [{"id": "1830000000000000001", "text": "v2 post", "author_id": "44",
                  "created_at": "2024-09-01T08:00:00.000Z",
                  "public_metrics": {"like_count": 9, "retweet_count": 1, "reply_count": 0, "quote_count": 0, "impression_count": 400}}],
        "includes": {"users": [{"id": "44", "username": "cryptokol", "name": "Crypto KOL"}]}
    }"#;
    let (_, scraper) = build(
        StaticHttpClient::new()
            .route("https://paid.test/", 500, "oops")
            .route("https://v2.test/2/tweets/search/recent", 200, v2),
    );
    scraper.credentials().set_api_key("k");

    let res = scraper.scrape_tweets(&opts()).await;

    assert_eq!(res.method, "paid-api:secondary");
    assert_eq!(res.tweets[0].url, "https://x.com/cryptokol/status/1830000000000000001");
    assert_eq!(res.tweets[0].metrics.views, Some(400));
    assert_eq!(methods(&res.attempts), vec!["paid-api:primary", "paid-api:secondary"]);
    assert_eq!(res.attempts[0].error(), Some(&StrategyError::Http { status: 500 }));
}

#[tokio::test]
async fn direct_session_runs_with_cookies() {
    let (http, scraper) = build(
        StaticHttpClient::new()
            .route(GQL_USER_URL, 200, GQL_USER)
            .route(GQL_TWEETS_URL, 200, GQL_USER_TWEETS),
    );
    let creds = Credentials {
        cookies: Some("auth_token=abc; ct0=tok".into()),
        ..Default::default()
    };

    let res = scraper.scrape_tweets_with(&opts(), &creds).await;

    assert_eq!(res.method, "direct-session");
    assert_eq!(res.tweets.len(), 2);
    assert_eq!(res.tweets[0].metrics.views, Some(54_000));
    assert!(res.tweets[1].is_retweet);
    assert_eq!(methods(&res.attempts), vec!["paid-api", "direct-session"]);

    let tweets_call = http
        .calls()
        .into_iter()
        .find(|u| u.contains("/UserTweets"))
        .expect("timeline requested");
    assert!(tweets_call.contains("44"), "user id resolved before timeline: {tweets_call}");
}

#[tokio::test]
async fn exhaustion_reports_none_and_recent_reasons() {
    let (_, scraper) = build(StaticHttpClient::new());

    let res = scraper.scrape_tweets(&opts()).await;

    assert!(!res.success);
    assert_eq!(res.method, "none");
    assert!(res.tweets.is_empty());
    let err = res.error.expect("error message");
    assert!(err.contains("nitter-rss:m3.test"), "{err}");
    assert!(!err.contains("paid-api"), "unconfigured tiers are not reasons: {err}");
    // 2 skipped tiers + 3 html + 3 rss
    assert_eq!(res.attempts.len(), 8);
}

#[tokio::test]
async fn keyword_miss_is_an_empty_success() {
    let (_, scraper) = build(StaticHttpClient::new().route("https://m1.test/", 200, TIMELINE_HTML));
    let options = opts().with_keywords(vec!["$DOGE".into()]);

    let res = scraper.scrape_tweets(&options).await;

    assert!(res.success);
    assert!(res.tweets.is_empty());
    assert_eq!(res.method, "nitter:m1.test");
    assert!(res.error.is_none());
}

#[tokio::test]
async fn keyword_filter_is_case_insensitive_or_match() {
    let (_, scraper) = build(StaticHttpClient::new().route("https://m1.test/", 200, TIMELINE_HTML));
    let options = opts().with_keywords(vec!["$sol".into(), "AIRDROP".into()]);

    let res = scraper.scrape_tweets(&options).await;

    let ids: Vec<&str> = res.tweets.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["1801000000000000001", "1805000000000000005"]);
}

#[tokio::test]
async fn single_tweet_lookup_by_url_or_id() {
    let (_, scraper) = build(StaticHttpClient::new().route(SYND_1801, 200, SYNDICATION_TWEET));

    let t = scraper
        .scrape_single_tweet("https://x.com/cryptokol/status/1801000000000000001?s=20")
        .await
        .expect("tweet found");
    assert_eq!(t.metrics.likes, 5120);
    assert_eq!(t.author_handle, "cryptokol");

    assert!(scraper.scrape_single_tweet("1801000000000000001").await.is_some());
    assert!(scraper.scrape_single_tweet("not a tweet").await.is_none());
    assert!(scraper.scrape_single_tweet("1999999999999999999").await.is_none());
}

#[tokio::test]
async fn batch_keys_are_normalized_and_deduplicated() {
    let (http, scraper) =
        build(StaticHttpClient::new().route("https://m1.test/", 200, TIMELINE_HTML));
    let handles: Vec<String> = ["@CryptoKOL", "cryptokol", " Other ", ""]
        .into_iter()
        .map(String::from)
        .collect();

    let out = scraper.scrape_multiple_kols(&handles, &[], 2).await;

    let mut keys: Vec<&String> = out.keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["cryptokol", "other"]);
    assert!(out.values().all(|r| r.success && r.tweets.len() <= 2));

    let page_calls = http.calls().iter().filter(|u| *u == "https://m1.test/cryptokol").count();
    assert_eq!(page_calls, 1);
}

#[tokio::test]
async fn profile_falls_back_to_mirror_card() {
    let (_, scraper) = build(
        StaticHttpClient::new()
            .route("https://m1.test/", 503, "")
            .route("https://m2.test/", 200, TIMELINE_HTML),
    );

    let res = scraper.scrape_profile("@cryptokol").await;

    assert!(res.success);
    assert_eq!(res.method, "nitter:m2.test");
    let p = res.profile.expect("profile");
    assert_eq!(p.followers, Some(98_765));
    assert!(p.verified);
}

#[tokio::test]
async fn profile_from_direct_session_has_user_id() {
    let (_, scraper) = build(StaticHttpClient::new().route(GQL_USER_URL, 200, GQL_USER));
    scraper.credentials().set_auth("auth_token=abc; ct0=tok", None);

    let res = scraper.scrape_profile("cryptokol").await;

    assert_eq!(res.method, "direct-session");
    let p = res.profile.expect("profile");
    assert_eq!(p.user_id.as_deref(), Some("44"));
    assert_eq!(p.bio, "Onchain research & alpha.");
}
