//! Declarative markup descriptions for mirror deployments.
//!
//! Mirrors drift: the same front-end renders slightly different HTML across
//! versions. Each schema lists, per field, the patterns to try in order. Every
//! pattern has exactly one capture group; the first pattern that matches wins.

use once_cell::sync::Lazy;
use regex::Regex;

pub struct FieldPatterns(Vec<Regex>);

impl FieldPatterns {
    fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self(
            patterns
                .iter()
                .map(|p| Regex::new(p.as_ref()).expect("schema pattern"))
                .collect(),
        )
    }

    /// First capture of the first matching pattern.
    pub fn first<'h>(&self, haystack: &'h str) -> Option<&'h str> {
        self.0.iter().find_map(|re| {
            re.captures(haystack)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
        })
    }

    /// All captures of the first pattern that matches at least once.
    pub fn all<'h>(&self, haystack: &'h str) -> Vec<&'h str> {
        for re in &self.0 {
            let found: Vec<&str> = re
                .captures_iter(haystack)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.iter().any(|re| re.is_match(haystack))
    }
}

pub struct TimelineSchema {
    pub name: &'static str,
    /// Opening tag of one timeline entry; the page is cut at every match.
    pub item_start: Regex,
    /// Entries that are navigation, not tweets.
    pub skip_item: Regex,
    pub link: FieldPatterns,
    pub content: FieldPatterns,
    pub fullname: FieldPatterns,
    pub username: FieldPatterns,
    pub date_title: FieldPatterns,
    pub date_text: FieldPatterns,
    pub replies: FieldPatterns,
    pub retweets: FieldPatterns,
    pub quotes: FieldPatterns,
    pub likes: FieldPatterns,
    pub views: FieldPatterns,
    pub media: FieldPatterns,
    pub retweet_marker: FieldPatterns,
    pub quote_link: FieldPatterns,
}

pub struct ProfileSchema {
    pub fullname: FieldPatterns,
    pub username: FieldPatterns,
    pub bio: FieldPatterns,
    pub avatar: FieldPatterns,
    pub tweets: FieldPatterns,
    pub following: FieldPatterns,
    pub followers: FieldPatterns,
    pub verified: FieldPatterns,
}

fn stat(icon: &str) -> String {
    format!(r#"(?s)<span class="icon-{icon}"[^>]*>\s*</span>\s*([\d.,]+[KkMmBb]?)"#)
}

static NITTER: Lazy<TimelineSchema> = Lazy::new(|| TimelineSchema {
    name: "nitter",
    item_start: Regex::new(r#"<div class="timeline-item[^"]*""#).expect("item start"),
    skip_item: Regex::new(r#"show-more|timeline-end|timeline-none"#).expect("skip item"),
    link: FieldPatterns::new(&[
        r#"class="tweet-link"\s+href="([^"]+)""#,
        r#"href="(/[^/"]+/status/\d+)[^"]*""#,
    ]),
    content: FieldPatterns::new(&[
        r#"(?s)<div class="tweet-content[^"]*"[^>]*>(.*?)</div>"#,
        r#"(?s)<p class="tweet-content[^"]*"[^>]*>(.*?)</p>"#,
    ]),
    fullname: FieldPatterns::new(&[
        r#"class="fullname"[^>]*title="([^"]*)""#,
        r#"class="fullname"[^>]*>([^<]+)<"#,
    ]),
    username: FieldPatterns::new(&[
        r#"class="username"[^>]*title="@?([^"]+)""#,
        r#"class="username"[^>]*>@?([^<]+)<"#,
    ]),
    date_title: FieldPatterns::new(&[r#"(?s)class="tweet-date"[^>]*>\s*<a[^>]*title="([^"]+)""#]),
    date_text: FieldPatterns::new(&[r#"(?s)class="tweet-date"[^>]*>\s*<a[^>]*>([^<]+)</a>"#]),
    replies: FieldPatterns::new(&[stat("comment")]),
    retweets: FieldPatterns::new(&[stat("retweet")]),
    quotes: FieldPatterns::new(&[stat("quote")]),
    likes: FieldPatterns::new(&[stat("heart")]),
    views: FieldPatterns::new(&[stat("views"), stat("play")]),
    media: FieldPatterns::new(&[
        r#"class="still-image"[^>]*href="([^"]+)""#,
        r#"<img[^>]*src="(/pic/(?:media|orig|amplify|ext_tw)[^"]+)""#,
    ]),
    retweet_marker: FieldPatterns::new(&[r#"(class="retweet-header")"#]),
    quote_link: FieldPatterns::new(&[
        r#"class="quote-link"\s+href="([^"]+)""#,
        r#"(?s)class="quote[^"]*".*?href="(/[^/"]+/status/\d+)[^"]*""#,
    ]),
});

static NITTER_LEGACY: Lazy<TimelineSchema> = Lazy::new(|| TimelineSchema {
    name: "nitter-legacy",
    item_start: Regex::new(r#"<div class="(?:timeline-item|timeline-tweet)[^"]*""#)
        .expect("item start"),
    skip_item: Regex::new(r#"show-more|timeline-end|timeline-none"#).expect("skip item"),
    link: FieldPatterns::new(&[
        r#"href="(/[^/"]+/status/\d+)[^"]*""#,
        r#"data-link="(/[^/"]+/status/\d+)""#,
    ]),
    content: FieldPatterns::new(&[
        r#"(?s)<p class="tweet-content[^"]*"[^>]*>(.*?)</p>"#,
        r#"(?s)<div class="tweet-content[^"]*"[^>]*>(.*?)</div>"#,
        r#"(?s)<div class="status-content[^"]*"[^>]*>(.*?)</div>"#,
    ]),
    fullname: FieldPatterns::new(&[r#"class="fullname"[^>]*>([^<]+)<"#]),
    username: FieldPatterns::new(&[r#"class="username"[^>]*>@?([^<]+)<"#]),
    date_title: FieldPatterns::new(&[r#"(?s)class="tweet-date"[^>]*>\s*<a[^>]*title="([^"]+)""#]),
    date_text: FieldPatterns::new(&[r#"(?s)class="tweet-date"[^>]*>\s*<a[^>]*>([^<]+)</a>"#]),
    replies: FieldPatterns::new(&[stat("comment")]),
    retweets: FieldPatterns::new(&[stat("retweet")]),
    quotes: FieldPatterns::new(&[stat("quote")]),
    likes: FieldPatterns::new(&[stat("heart")]),
    views: FieldPatterns::new(&[stat("views")]),
    media: FieldPatterns::new(&[r#"<img[^>]*src="(/pic/[^"]+)""#]),
    retweet_marker: FieldPatterns::new(&[
        r#"(class="retweet(?:-header)?")"#,
        r#"(icon-retweeted)"#,
    ]),
    quote_link: FieldPatterns::new(&[r#"class="quote-link"\s+href="([^"]+)""#]),
});

static NITTER_PROFILE: Lazy<ProfileSchema> = Lazy::new(|| ProfileSchema {
    fullname: FieldPatterns::new(&[
        r#"class="profile-card-fullname"[^>]*title="([^"]*)""#,
        r#"class="profile-card-fullname"[^>]*>([^<]+)<"#,
    ]),
    username: FieldPatterns::new(&[
        r#"class="profile-card-username"[^>]*title="@?([^"]+)""#,
        r#"class="profile-card-username"[^>]*>@?([^<]+)<"#,
    ]),
    bio: FieldPatterns::new(&[
        r#"(?s)<div class="profile-bio"[^>]*>(.*?)</div>"#,
        r#"(?s)<p class="profile-bio"[^>]*>(.*?)</p>"#,
    ]),
    avatar: FieldPatterns::new(&[
        r#"(?s)class="profile-card-avatar"[^>]*href="([^"]+)""#,
        r#"(?s)class="profile-card-avatar".*?<img[^>]*src="([^"]+)""#,
    ]),
    tweets: FieldPatterns::new(&[
        r#"(?s)<li class="posts">.*?class="profile-stat-num">([^<]+)<"#,
    ]),
    following: FieldPatterns::new(&[
        r#"(?s)<li class="following">.*?class="profile-stat-num">([^<]+)<"#,
    ]),
    followers: FieldPatterns::new(&[
        r#"(?s)<li class="followers">.*?class="profile-stat-num">([^<]+)<"#,
    ]),
    verified: FieldPatterns::new(&[r#"(icon-ok verified-icon)"#, r#"(verified-icon)"#]),
});

/// Schema lookup by the name used in mirror config; unknown names fall back to `nitter`.
pub fn timeline_schema(name: &str) -> &'static TimelineSchema {
    match name {
        "nitter-legacy" => &NITTER_LEGACY,
        _ => &NITTER,
    }
}

pub fn profile_schema() -> &'static ProfileSchema {
    &NITTER_PROFILE
}
