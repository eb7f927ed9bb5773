// src/parse/mod.rs
pub mod html;
pub mod metric;
pub mod rss;
pub mod schema;
pub mod text;

pub use metric::{extract_tweet_id, matches_keywords, parse_metric_number, parse_relative_time};
