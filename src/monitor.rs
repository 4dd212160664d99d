// src/monitor.rs
//! Poll-driven dashboard state.
//!
//! Three timers feed one shared [`Dashboard`]: counters, the latest session
//! page, and the full item collection. Every cycle fetches, then recomputes
//! synchronously under the lock. A failed fetch keeps the last good state and
//! only flips the `connected` flag.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;

use crate::aggregate::{aggregate_at, AggregateSnapshot};
use crate::change_detector::ChangeDetector;
use crate::client::{fetch_all_items, with_retry, CollectionSource, SessionQuery};
use crate::config::MonitorConfig;
use crate::notify::NotificationEvent;
use crate::scheduler::PollTask;
use crate::types::{CollectionStats, SessionRecord};

/// What the presentation layer reads.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardView {
    pub stats: Option<CollectionStats>,
    pub sessions: Vec<SessionRecord>,
    pub snapshot: AggregateSnapshot,
    pub connected: bool,
    pub last_refresh: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct Shared {
    view: DashboardView,
    detector: ChangeDetector,
}

/// Cloneable handle over the shared derived state.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<Mutex<Shared>>,
}

impl Dashboard {
    pub fn new(detector: ChangeDetector) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Shared {
                view: DashboardView::default(),
                detector,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view(&self) -> DashboardView {
        self.lock().view.clone()
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        self.lock().view.snapshot.clone()
    }

    pub fn notifications(&self) -> Vec<NotificationEvent> {
        self.lock().detector.notifications().to_vec()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().detector.unread_count()
    }

    pub fn mark_read(&self, id: &str) -> bool {
        self.lock().detector.mark_read(id)
    }

    pub fn mark_all_read(&self) {
        self.lock().detector.mark_all_read();
    }

    pub fn delete_notification(&self, id: &str) -> bool {
        self.lock().detector.delete(id)
    }

    /// Run `f` against the detector under the lock.
    pub fn with_detector<R>(&self, f: impl FnOnce(&mut ChangeDetector) -> R) -> R {
        f(&mut self.lock().detector)
    }

    fn apply_stats(&self, stats: CollectionStats, now: DateTime<Utc>) -> Vec<NotificationEvent> {
        let mut g = self.lock();
        let fired = g.detector.observe_stats(&stats, now);
        g.view.stats = Some(stats);
        mark_ok(&mut g.view, now);
        fired
    }

    fn apply_sessions(
        &self,
        sessions: Vec<SessionRecord>,
        now: DateTime<Utc>,
    ) -> Vec<NotificationEvent> {
        let mut g = self.lock();
        let fired = g.detector.observe_sessions(&sessions, now);
        g.view.sessions = sessions;
        mark_ok(&mut g.view, now);
        fired
    }

    fn apply_snapshot(&self, snapshot: AggregateSnapshot, now: DateTime<Utc>) {
        let mut g = self.lock();
        g.view.snapshot = snapshot;
        mark_ok(&mut g.view, now);
    }

    fn mark_failed(&self, err: &anyhow::Error) {
        let mut g = self.lock();
        g.view.connected = false;
        g.view.last_error = Some(format!("{err:#}"));
    }
}

fn mark_ok(view: &mut DashboardView, now: DateTime<Utc>) {
    view.connected = true;
    view.last_refresh = Some(now);
    view.last_error = None;
}

/// Owns the poll timers. Dropping or stopping it clears all of them.
pub struct Monitor {
    source: Arc<dyn CollectionSource>,
    dashboard: Dashboard,
    cfg: MonitorConfig,
    tasks: Vec<PollTask>,
}

impl Monitor {
    pub fn new(
        source: Arc<dyn CollectionSource>,
        detector: ChangeDetector,
        cfg: MonitorConfig,
    ) -> Self {
        Self {
            source,
            dashboard: Dashboard::new(detector),
            cfg,
            tasks: Vec::new(),
        }
    }

    pub fn dashboard(&self) -> Dashboard {
        self.dashboard.clone()
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(PollTask::is_running)
    }

    /// Spawn the three poll timers. Calling it again restarts them.
    pub fn start(&mut self) {
        self.stop();

        let ctx = self.cycle_ctx();
        self.tasks.push(PollTask::spawn(
            "stats",
            self.cfg.stats_interval(),
            move || {
                let ctx = ctx.clone();
                async move {
                    ctx.refresh_stats().await;
                }
            },
        ));

        let ctx = self.cycle_ctx();
        self.tasks.push(PollTask::spawn(
            "sessions",
            self.cfg.sessions_interval(),
            move || {
                let ctx = ctx.clone();
                async move {
                    ctx.refresh_sessions().await;
                }
            },
        ));

        let ctx = self.cycle_ctx();
        self.tasks.push(PollTask::spawn(
            "items",
            self.cfg.items_interval(),
            move || {
                let ctx = ctx.clone();
                async move {
                    ctx.refresh_items().await;
                }
            },
        ));

        tracing::info!(target: "monitor", source = self.source.name(), "polling started");
    }

    pub fn stop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for t in &mut self.tasks {
            t.stop();
        }
        self.tasks.clear();
        tracing::info!(target: "monitor", "polling stopped");
    }

    /// One counters cycle, outside the timers.
    pub async fn refresh_stats(&self) -> Vec<NotificationEvent> {
        self.cycle_ctx().refresh_stats().await
    }

    /// One sessions cycle, outside the timers.
    pub async fn refresh_sessions(&self) -> Vec<NotificationEvent> {
        self.cycle_ctx().refresh_sessions().await
    }

    /// One full-collection cycle, outside the timers.
    pub async fn refresh_items(&self) {
        self.cycle_ctx().refresh_items().await
    }

    fn cycle_ctx(&self) -> CycleCtx {
        CycleCtx {
            source: self.source.clone(),
            dashboard: self.dashboard.clone(),
            cfg: self.cfg.clone(),
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything a single poll cycle needs, cheap to clone into a timer.
#[derive(Clone)]
struct CycleCtx {
    source: Arc<dyn CollectionSource>,
    dashboard: Dashboard,
    cfg: MonitorConfig,
}

impl CycleCtx {
    async fn refresh_stats(&self) -> Vec<NotificationEvent> {
        counter!("monitor_poll_cycles_total", "timer" => "stats").increment(1);
        let source = self.source.as_ref();
        match with_retry("stats", self.cfg.fetch_retries, || source.fetch_stats()).await {
            Ok(stats) => {
                gauge!("monitor_total_items").set(stats.total_items as f64);
                self.dashboard.apply_stats(stats, Utc::now())
            }
            Err(e) => {
                self.fail("stats", &e);
                Vec::new()
            }
        }
    }

    async fn refresh_sessions(&self) -> Vec<NotificationEvent> {
        counter!("monitor_poll_cycles_total", "timer" => "sessions").increment(1);
        let source = self.source.as_ref();
        let query = SessionQuery::latest(self.cfg.sessions_page_size());
        let fetched = with_retry("sessions", self.cfg.fetch_retries, || {
            source.fetch_sessions(&query)
        })
        .await;
        match fetched {
            Ok(sessions) => self.dashboard.apply_sessions(sessions, Utc::now()),
            Err(e) => {
                self.fail("sessions", &e);
                Vec::new()
            }
        }
    }

    async fn refresh_items(&self) {
        counter!("monitor_poll_cycles_total", "timer" => "items").increment(1);
        let source = self.source.as_ref();
        let (per_page, max_pages) = (self.cfg.items_page_size(), self.cfg.max_item_pages);
        let fetched = with_retry("items", self.cfg.fetch_retries, || {
            fetch_all_items(source, per_page, max_pages)
        })
        .await;

        match fetched {
            Ok(items) => {
                let now = Utc::now();
                let snapshot = aggregate_at(&items, now);
                tracing::debug!(
                    target: "monitor",
                    items = snapshot.item_count,
                    valued = snapshot.valued_count,
                    "snapshot recomputed"
                );
                gauge!("monitor_last_refresh_ts").set(now.timestamp() as f64);
                self.dashboard.apply_snapshot(snapshot, now);
            }
            Err(e) => self.fail("items", &e),
        }
    }

    fn fail(&self, timer: &'static str, err: &anyhow::Error) {
        counter!("monitor_fetch_errors_total", "timer" => timer).increment(1);
        tracing::warn!(target: "monitor", timer, "poll cycle failed, keeping last state: {err:#}");
        self.dashboard.mark_failed(err);
    }
}
