//! Auction monitor service entrypoint.
//! Polls the scraping API on three timers, keeps the derived dashboard state,
//! and serves it over HTTP until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use auction_monitor::api::{self, AppState};
use auction_monitor::client::HttpCollectionSource;
use auction_monitor::config::MonitorConfig;
use auction_monitor::metrics::Metrics;
use auction_monitor::{ChangeDetector, FileStore, Monitor, WriteBehindStore};

/// Compact logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = MonitorConfig::load()?;

    // Install the recorder before any poll cycle counts something.
    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!("metrics disabled: {e:#}");
            None
        }
    };

    // Detector state lives behind the dashboard mutex; disk writes go through
    // the write-behind queue instead of happening under that lock.
    let store = Arc::new(WriteBehindStore::spawn(Arc::new(FileStore::new(
        cfg.state_dir.clone(),
    ))));
    let detector = ChangeDetector::new(store.clone());
    let source = Arc::new(HttpCollectionSource::new(
        cfg.api_base_url.clone(),
        cfg.request_timeout(),
    )?);

    let mut monitor = Monitor::new(source, detector, cfg.clone());
    monitor.start();

    let mut router = api::create_router(AppState {
        dashboard: monitor.dashboard(),
    });
    if let Some(m) = &metrics {
        router = router.merge(m.router());
    }

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("bind {}", cfg.listen_addr))?;
    tracing::info!(addr = %cfg.listen_addr, api = %cfg.api_base_url, "dashboard API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serve dashboard API")?;

    monitor.stop();
    store.flush().await;
    tracing::info!("shutdown complete");
    Ok(())
}
