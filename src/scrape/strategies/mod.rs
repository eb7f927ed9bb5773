// src/scrape/strategies/mod.rs
//! Independent acquisition strategies. Every entry point resolves to a result
//! value; failures are data (`StrategyError` inside an `Attempt`), never panics.

pub mod direct;
pub mod mirror_html;
pub mod mirror_rss;
pub mod paid_api;
pub mod syndication;

use serde_json::Value;

use crate::config::{ScraperConfig, SoftFailureConfig};
use crate::credentials::Credentials;
use crate::scrape::http::{HttpClient, HttpRequest};
use crate::scrape::types::StrategyError;

/// Everything a strategy may touch during one call.
pub struct StrategyContext<'a> {
    pub http: &'a dyn HttpClient,
    pub config: &'a ScraperConfig,
    pub credentials: &'a Credentials,
}

impl StrategyContext<'_> {
    /// Execute and require a 2xx.
    pub(crate) async fn fetch_ok(&self, req: HttpRequest) -> Result<String, StrategyError> {
        self.http.execute(req).await?.into_success()
    }
}

/// Build `base` + query pairs with proper escaping.
pub(crate) fn url_with_params(
    base: &str,
    params: &[(&str, &str)],
) -> Result<String, StrategyError> {
    reqwest::Url::parse_with_params(base, params)
        .map(|u| u.to_string())
        .map_err(|e| StrategyError::Parse(format!("bad url {base}: {e}")))
}

pub(crate) fn parse_json(body: &str) -> Result<Value, StrategyError> {
    serde_json::from_str(body).map_err(|e| StrategyError::Parse(format!("invalid json: {e}")))
}

/// Short or truncated pages are never a usable timeline.
pub(crate) fn check_truncated(body: &str, cfg: &SoftFailureConfig) -> Result<(), StrategyError> {
    if body.trim().len() < cfg.min_body_bytes {
        return Err(StrategyError::Blocked(format!(
            "truncated page ({} bytes)",
            body.trim().len()
        )));
    }
    Ok(())
}

/// Explain an unusable page: a known rate-limit/block banner, or `fallback`.
pub(crate) fn diagnose_page(
    body: &str,
    cfg: &SoftFailureConfig,
    fallback: StrategyError,
) -> StrategyError {
    let lower = body.to_lowercase();
    cfg.markers
        .iter()
        .find(|m| lower.contains(m.as_str()))
        .map(|m| StrategyError::Blocked(m.clone()))
        .unwrap_or(fallback)
}

// ---- safe lookups over loosely-shaped JSON ----

pub(crate) fn str_at(v: &Value, pointer: &str) -> Option<String> {
    match v.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers or numeric strings (`"1234"`); anything else is `None`.
pub(crate) fn u64_at(v: &Value, pointer: &str) -> Option<u64> {
    match v.pointer(pointer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn bool_at(v: &Value, pointer: &str) -> bool {
    v.pointer(pointer).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn array_at<'v>(v: &'v Value, pointer: &str) -> &'v [Value] {
    v.pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Non-null object at `pointer`.
pub(crate) fn object_at<'v>(v: &'v Value, pointer: &str) -> Option<&'v Value> {
    v.pointer(pointer).filter(|x| x.is_object())
}
