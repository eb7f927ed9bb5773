use anyhow::Context;
use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::ScraperConfig;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and publish static config gauges.
    pub fn init(config: &ScraperConfig) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        gauge!("scrape_mirrors_configured").set(config.mirrors.len() as f64);
        gauge!("scrape_enrichment_limit").set(config.syndication.enrichment_limit as f64);

        Ok(Self { handle })
    }

    /// `GET /metrics`: the config gauges plus the per-tier
    /// `scrape_attempts_total{method,outcome}`, `scrape_tweets_returned_total`
    /// and `scrape_parse_ms` series, rendered per request.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route("/metrics", get(move || render(handle.clone())))
    }
}

async fn render(handle: PrometheusHandle) -> String {
    handle.render()
}
