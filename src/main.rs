//! Binary entrypoint: boots the Axum HTTP server and the background
//! polling loop that feeds it.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use disaster_signal_aggregator::api;
use disaster_signal_aggregator::classify::DisasterClassifier;
use disaster_signal_aggregator::ingest::{
    self,
    config::{load_handles_default, DEFAULT_HANDLES},
    providers::twitter::TwitterProvider,
    publish::HttpStoreClient,
    types::SourceProvider,
    AggregatorCfg,
};
use disaster_signal_aggregator::metrics::Metrics;

const ENV_BEARER_TOKEN: &str = "TWITTER_BEARER_TOKEN";

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - AGGREGATOR_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("AGGREGATOR_DEV_LOG")
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
        .unwrap_or_else(|_| EnvFilter::new("aggregator=info,classify=info,api=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let metrics = Metrics::init();
    let router = api::create_router().merge(metrics.router());

    // Without credentials the service still serves the API; only the
    // background polling loop is off.
    match std::env::var(ENV_BEARER_TOKEN) {
        Ok(token) => {
            let handles = load_handles_default().unwrap_or_else(|e| {
                tracing::warn!(error = ?e, "handle config failed to load; using defaults");
                DEFAULT_HANDLES.iter().map(|s| s.to_string()).collect()
            });
            let providers: Vec<Box<dyn SourceProvider>> = handles
                .iter()
                .map(|h| {
                    Box::new(TwitterProvider::from_bearer(h.clone(), token.clone()))
                        as Box<dyn SourceProvider>
                })
                .collect();
            ingest::spawn_aggregator(
                AggregatorCfg::default(),
                providers,
                DisasterClassifier::new(),
                Arc::new(HttpStoreClient::from_env()),
            );
        }
        Err(_) => {
            tracing::warn!("TWITTER_BEARER_TOKEN not set; polling loop disabled");
        }
    }

    Ok(router.into())
}
