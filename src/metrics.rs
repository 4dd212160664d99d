use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe the poller series.
    /// Only one recorder can exist per process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!("monitor_poll_cycles_total", "Poll cycles started, by timer.");
        describe_counter!(
            "monitor_fetch_errors_total",
            "Poll cycles that failed after retry, by timer."
        );
        describe_counter!(
            "monitor_notifications_total",
            "Notifications added to the feed, by kind."
        );
        describe_gauge!("monitor_total_items", "Last observed total item count.");
        describe_gauge!(
            "monitor_last_refresh_ts",
            "Unix ts of the last successful collection snapshot."
        );

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
