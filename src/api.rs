use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::credentials::Credentials;
use crate::scrape::types::{ProfileResult, ScrapeOptions, ScrapeResult, ScrapedTweet};
use crate::scrape::Scraper;

#[derive(Clone)]
pub struct AppState {
    scraper: Arc<Scraper>,
}

impl AppState {
    pub fn new(scraper: Arc<Scraper>) -> Self {
        Self { scraper }
    }

    /// Request credentials override the store defaults field by field.
    fn credentials(&self, from_request: Option<Credentials>) -> Credentials {
        let defaults = self.scraper.credentials().snapshot();
        match from_request {
            Some(c) => c.or_defaults(&defaults),
            None => defaults,
        }
    }
}

pub fn create_router(scraper: Arc<Scraper>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/scrape", post(scrape))
        .route("/scrape/batch", post(scrape_batch))
        .route("/tweet", get(single_tweet))
        .route("/profile/{handle}", get(profile))
        .layer(CorsLayer::very_permissive())
        .with_state(AppState::new(scraper))
}

#[derive(Deserialize)]
struct ScrapeReq {
    #[serde(flatten)]
    options: ScrapeOptions,
    #[serde(default)]
    credentials: Option<Credentials>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchReq {
    handles: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_max_per_handle")]
    max_per_handle: usize,
    #[serde(default)]
    credentials: Option<Credentials>,
}

fn default_max_per_handle() -> usize {
    20
}

#[derive(Deserialize)]
struct TweetQuery {
    url: String,
}

async fn scrape(State(state): State<AppState>, Json(body): Json<ScrapeReq>) -> Json<ScrapeResult> {
    let creds = state.credentials(body.credentials);
    Json(state.scraper.scrape_tweets_with(&body.options, &creds).await)
}

async fn scrape_batch(
    State(state): State<AppState>,
    Json(body): Json<BatchReq>,
) -> Json<HashMap<String, ScrapeResult>> {
    let creds = state.credentials(body.credentials);
    Json(
        state
            .scraper
            .scrape_multiple_kols_with(&body.handles, &body.keywords, body.max_per_handle, &creds)
            .await,
    )
}

async fn single_tweet(
    State(state): State<AppState>,
    Query(q): Query<TweetQuery>,
) -> Json<Option<ScrapedTweet>> {
    Json(state.scraper.scrape_single_tweet(&q.url).await)
}

async fn profile(State(state): State<AppState>, Path(handle): Path<String>) -> Json<ProfileResult> {
    let creds = state.credentials(None);
    Json(state.scraper.scrape_profile_with(&handle, &creds).await)
}
