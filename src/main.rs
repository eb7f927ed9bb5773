//! KOL scraper service: binary entrypoint.
//! Boots the Axum HTTP server with the scraper, its default credentials and
//! the Prometheus exporter.

use std::sync::Arc;

use anyhow::Context;
use kol_scraper::{api, config, metrics::Metrics, Credentials, Scraper};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - SCRAPER_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("SCRAPER_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kol_scraper=info,warn"));

    // Shuttle may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let cfg = config::load_config_default().context("loading scraper config")?;
    let metrics = Metrics::init(&cfg)?;

    let defaults = Credentials::from_env();
    tracing::info!(
        mirrors = cfg.mirrors.len(),
        api_key = defaults.has_api_key(),
        session = defaults.has_auth(),
        "scraper starting"
    );
    let scraper = Scraper::from_config(cfg)?.with_default_credentials(defaults);

    let router = api::create_router(Arc::new(scraper)).merge(metrics.router());

    Ok(router.into())
}
