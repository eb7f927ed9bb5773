// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod credentials;
pub mod metrics;
pub mod parse;
pub mod scrape;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router as router;
pub use crate::config::{load_config_default, load_config_from, ScraperConfig};
pub use crate::credentials::{CredentialStore, Credentials};
pub use crate::scrape::types::{
    Attempt, AttemptOutcome, ProfileResult, ScrapeOptions, ScrapeResult, ScrapedProfile,
    ScrapedTweet, StrategyError, TweetMetrics,
};
pub use crate::scrape::Scraper;
