// src/change_detector.rs
//! Turns successive poll results into dashboard notifications.
//!
//! Two independently arriving streams feed the detector: aggregate counters
//! (`observe_stats`) and the most recent session page (`observe_sessions`).
//! Each stream primes its own part of the persisted [`PollState`] on first
//! sight and emits nothing, so a fresh dashboard never floods the feed.
//! Afterwards a counter increase yields one `new-items` event and a session
//! newer than the last seen id that reached a terminal state yields one
//! success/failure event.
//!
//! Sessions first seen while still running are remembered as pending and
//! notified when a later page shows them finished.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::notify::{NotificationEvent, NotificationKind, NotificationLog};
use crate::store::KvStore;
use crate::types::{CollectionStats, SessionRecord, SessionStatus};

pub const POLL_STATE_KEY: &str = "scrapers_art_last_state";
pub const NOTIFICATIONS_KEY: &str = "scrapers_art_notifications";

pub const ITEMS_LINK: &str = "/items";
pub const SESSIONS_LINK: &str = "/sessions";

const MAX_PENDING_SESSIONS: usize = 50;
const UNKNOWN_ERROR: &str = "Unknown error";

/// Last observation, persisted under [`POLL_STATE_KEY`]. `None` fields belong
/// to a stream that has not been observed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollState {
    #[serde(rename = "total_obras", default)]
    pub total_items: Option<u64>,
    #[serde(rename = "total_sessoes", default)]
    pub total_sessions: Option<u64>,
    #[serde(default)]
    pub last_session_id: Option<u64>,
    /// Ids above an earlier `last_session_id` that were still running.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_session_ids: Vec<u64>,
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Utc>,
}

impl PollState {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            total_items: None,
            total_sessions: None,
            last_session_id: None,
            pending_session_ids: Vec::new(),
            captured_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorPhase {
    /// No persisted poll-state exists.
    Uninitialized,
    /// Poll-state exists; the next observation is compared against it.
    Primed,
    /// At least one observation has been compared.
    Steady,
}

pub struct ChangeDetector {
    store: Arc<dyn KvStore>,
    log: NotificationLog,
    phase: DetectorPhase,
}

impl ChangeDetector {
    /// Load the notification log and poll-state from `store`. Corrupt entries
    /// are logged and treated as absent.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let log = match store.get(NOTIFICATIONS_KEY) {
            Some(raw) => NotificationLog::from_json(&raw).unwrap_or_else(|e| {
                tracing::warn!(target: "detector", "discarding notification log: {e:#}");
                NotificationLog::default()
            }),
            None => NotificationLog::default(),
        };
        let mut det = Self {
            store,
            log,
            phase: DetectorPhase::Uninitialized,
        };
        if det.load_poll_state().is_some() {
            det.phase = DetectorPhase::Primed;
        }
        det
    }

    pub fn phase(&self) -> DetectorPhase {
        self.phase
    }

    /// Current persisted poll-state, if any.
    pub fn poll_state(&self) -> Option<PollState> {
        self.load_poll_state()
    }

    /// Compare aggregate counters with the last observation.
    pub fn observe_stats(
        &mut self,
        stats: &CollectionStats,
        now: DateTime<Utc>,
    ) -> Vec<NotificationEvent> {
        let prior = self.load_poll_state();
        let had_prior = prior.is_some();
        let mut state = prior.unwrap_or_else(|| PollState::empty(now));
        let mut found = Vec::new();

        match state.total_items {
            None => {
                tracing::info!(
                    target: "detector",
                    total_items = stats.total_items,
                    "item counter primed"
                );
            }
            Some(prev) if stats.total_items > prev => {
                let delta = stats.total_items - prev;
                tracing::info!(target: "detector", delta, total = stats.total_items, "new items detected");
                found.push(new_items_event(delta, stats.total_items, now));
            }
            Some(_) => {}
        }

        state.total_items = Some(stats.total_items);
        state.total_sessions = Some(stats.total_sessions);
        state.captured_at = now;
        self.save_poll_state(&state);
        self.advance(had_prior);

        self.append(found)
    }

    /// Compare the latest session page with the last seen session id.
    pub fn observe_sessions(
        &mut self,
        sessions: &[SessionRecord],
        now: DateTime<Utc>,
    ) -> Vec<NotificationEvent> {
        let prior = self.load_poll_state();
        let had_prior = prior.is_some();
        let mut state = prior.unwrap_or_else(|| PollState::empty(now));
        let page_max = sessions.iter().map(|s| s.id).max().unwrap_or(0);

        let mut ordered: Vec<&SessionRecord> = sessions.iter().collect();
        ordered.sort_by_key(|s| s.id);

        let mut found = Vec::new();
        match state.last_session_id {
            None => {
                tracing::info!(target: "detector", last_session_id = page_max, "session cursor primed");
                state.last_session_id = Some(page_max);
            }
            Some(last) => {
                for s in ordered {
                    let is_new = s.id > last;
                    let pending_at = state.pending_session_ids.iter().position(|id| *id == s.id);
                    if !is_new && pending_at.is_none() {
                        continue;
                    }
                    match s.status {
                        SessionStatus::Succeeded => found.push(session_succeeded_event(s, now)),
                        SessionStatus::Failed => found.push(session_failed_event(s, now)),
                        SessionStatus::Interrupted => {}
                        SessionStatus::Running | SessionStatus::Unknown => {
                            if is_new {
                                state.pending_session_ids.push(s.id);
                            }
                            continue;
                        }
                    }
                    if let Some(i) = pending_at {
                        state.pending_session_ids.remove(i);
                    }
                }
                state.last_session_id = Some(last.max(page_max));
            }
        }

        let excess = state
            .pending_session_ids
            .len()
            .saturating_sub(MAX_PENDING_SESSIONS);
        state.pending_session_ids.drain(0..excess);
        state.captured_at = now;
        self.save_poll_state(&state);
        self.advance(had_prior);

        self.append(found)
    }

    pub fn notifications(&self) -> &[NotificationEvent] {
        self.log.events()
    }

    pub fn unread_count(&self) -> usize {
        self.log.unread_count()
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        let found = self.log.mark_read(id);
        if found {
            self.persist_log();
        }
        found
    }

    pub fn mark_all_read(&mut self) {
        self.log.mark_all_read();
        self.persist_log();
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let removed = self.log.remove(id);
        if removed {
            self.persist_log();
        }
        removed
    }

    fn advance(&mut self, had_prior: bool) {
        self.phase = if had_prior {
            DetectorPhase::Steady
        } else {
            DetectorPhase::Primed
        };
    }

    /// Push into the log, keeping only events that were not duplicates.
    fn append(&mut self, candidates: Vec<NotificationEvent>) -> Vec<NotificationEvent> {
        let mut added = Vec::new();
        for ev in candidates {
            if self.log.push(ev.clone()) {
                counter!("monitor_notifications_total", "kind" => ev.kind.as_str()).increment(1);
                added.push(ev);
            } else {
                tracing::debug!(target: "detector", id = %ev.id, "duplicate notification skipped");
            }
        }
        if !added.is_empty() {
            self.persist_log();
        }
        added
    }

    fn load_poll_state(&self) -> Option<PollState> {
        let raw = self.store.get(POLL_STATE_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(target: "detector", "corrupt poll state, starting fresh: {e:#}");
                None
            }
        }
    }

    fn save_poll_state(&self, state: &PollState) {
        let res = serde_json::to_string(state)
            .map_err(anyhow::Error::from)
            .and_then(|s| self.store.set(POLL_STATE_KEY, &s));
        if let Err(e) = res {
            tracing::warn!(target: "detector", "write poll state: {e:#}");
        }
    }

    fn persist_log(&self) {
        let res = self
            .log
            .to_json()
            .and_then(|s| self.store.set(NOTIFICATIONS_KEY, &s));
        if let Err(e) = res {
            tracing::warn!(target: "detector", "write notifications: {e:#}");
        }
    }
}

fn new_items_event(delta: u64, total: u64, now: DateTime<Utc>) -> NotificationEvent {
    let message = if delta == 1 {
        "1 new item was collected".to_string()
    } else {
        format!("{delta} new items were collected")
    };
    // time-salted: two increases are two distinct events
    let id = format!(
        "{}-{}-{}",
        NotificationKind::NewItems.as_str(),
        total,
        now.timestamp_millis()
    );
    NotificationEvent::new(id, NotificationKind::NewItems, "New items collected", message, now)
        .with_link(ITEMS_LINK)
}

fn session_succeeded_event(s: &SessionRecord, now: DateTime<Utc>) -> NotificationEvent {
    let kind = NotificationKind::SessionSucceeded;
    NotificationEvent::new(
        format!("{}-{}", kind.as_str(), s.id),
        kind,
        "Session completed",
        format!(
            "Scraping {} completed with {} items collected",
            s.source.to_uppercase(),
            s.item_count
        ),
        s.finished_at.or(s.started_at).unwrap_or(now),
    )
    .with_link(SESSIONS_LINK)
}

fn session_failed_event(s: &SessionRecord, now: DateTime<Utc>) -> NotificationEvent {
    let kind = NotificationKind::SessionFailed;
    let reason = s
        .error
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or(UNKNOWN_ERROR);
    NotificationEvent::new(
        format!("{}-{}", kind.as_str(), s.id),
        kind,
        "Session failed",
        format!("Session {} failed: {}", s.source.to_uppercase(), reason),
        s.started_at.unwrap_or(now),
    )
    .with_link(SESSIONS_LINK)
}
