// src/scrape/http.rs
//! Outbound HTTP seam. Strategies only see `HttpClient`, so tests can swap in a
//! canned implementation and production uses reqwest.

use std::time::Duration;

use async_trait::async_trait;

use crate::scrape::types::StrategyError;

/// Browser-like UA; several upstreams refuse obvious bot agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Non-2xx becomes `StrategyError::Http`.
    pub fn into_success(self) -> Result<String, StrategyError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(StrategyError::Http {
                status: self.status,
            })
        }
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Transport failures and timeouts come back as `Err`; any HTTP status is `Ok`.
    async fn execute(&self, req: HttpRequest) -> Result<HttpResponse, StrategyError>;
}

/// reqwest timeouts become `Timeout`, everything else `Transport`.
fn transport_error(e: &reqwest::Error, timeout: Duration, context: &str) -> StrategyError {
    if e.is_timeout() {
        StrategyError::Timeout {
            after_secs: timeout.as_secs(),
        }
    } else {
        StrategyError::Transport(format!("{context}{e}"))
    }
}

pub struct ReqwestHttpClient {
    client: reqwest::Client,
    user_agent: String,
}

impl ReqwestHttpClient {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, req: HttpRequest) -> Result<HttpResponse, StrategyError> {
        let mut builder = self
            .client
            .get(&req.url)
            .timeout(req.timeout)
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str());

        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| transport_error(&e, req.timeout, ""))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| transport_error(&e, req.timeout, "reading body: "))?;

        tracing::debug!(url = %req.url, status, bytes = body.len(), "upstream response");
        Ok(HttpResponse { status, body })
    }
}

/// Canned responses keyed by URL prefix, for tests and local runs.
/// The longest matching prefix wins; unmatched URLs fail as transport errors.
#[derive(Default)]
pub struct StaticHttpClient {
    routes: Vec<(String, Result<HttpResponse, StrategyError>)>,
    calls: std::sync::Mutex<Vec<String>>,
}

impl StaticHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url_prefix: &str, status: u16, body: impl Into<String>) -> Self {
        self.routes.push((
            url_prefix.to_string(),
            Ok(HttpResponse {
                status,
                body: body.into(),
            }),
        ));
        self
    }

    /// Fail matching requests with `error` (timeouts, resets) instead of a response.
    pub fn route_error(mut self, url_prefix: &str, error: StrategyError) -> Self {
        self.routes.push((url_prefix.to_string(), Err(error)));
        self
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        match self.calls.lock() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }
}

#[async_trait]
impl HttpClient for StaticHttpClient {
    async fn execute(&self, req: HttpRequest) -> Result<HttpResponse, StrategyError> {
        match self.calls.lock() {
            Ok(mut g) => g.push(req.url.clone()),
            Err(poison) => poison.into_inner().push(req.url.clone()),
        }
        self.routes
            .iter()
            .filter(|(prefix, _)| req.url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or_else(|| {
                Err(StrategyError::Transport(format!(
                    "connection refused: {}",
                    req.url
                )))
            })
    }
}
