// src/notify/log.rs
use anyhow::{Context, Result};

use super::NotificationEvent;

/// Retained notifications; older entries beyond this are dropped.
pub const MAX_NOTIFICATIONS: usize = 50;

/// Newest-first list of notifications, deduplicated by id and capped.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationLog {
    events: Vec<NotificationEvent>,
    cap: usize,
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::with_capacity(MAX_NOTIFICATIONS)
    }
}

impl NotificationLog {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            events: Vec::with_capacity(cap.min(MAX_NOTIFICATIONS)),
            cap: cap.max(1),
        }
    }

    /// Restore a persisted log. Entries that do not parse (e.g. a kind this
    /// service never emits) are skipped one by one; only a document that is
    /// not a JSON array fails. The cap is applied to what remains.
    pub fn from_json(s: &str) -> Result<Self> {
        let raw: Vec<serde_json::Value> =
            serde_json::from_str(s).context("parse persisted notifications")?;
        let mut events = Vec::with_capacity(raw.len().min(MAX_NOTIFICATIONS));
        for entry in raw {
            match serde_json::from_value::<NotificationEvent>(entry) {
                Ok(ev) => events.push(ev),
                Err(e) => tracing::debug!(target: "detector", "skipping stored notification: {e}"),
            }
        }
        events.truncate(MAX_NOTIFICATIONS);
        Ok(Self {
            events,
            cap: MAX_NOTIFICATIONS,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.events).context("serialize notifications")
    }

    /// Prepend `ev` unless an event with the same id exists. Returns whether
    /// it was added.
    pub fn push(&mut self, ev: NotificationEvent) -> bool {
        if self.events.iter().any(|e| e.id == ev.id) {
            return false;
        }
        self.events.insert(0, ev);
        self.events.truncate(self.cap);
        true
    }

    /// Returns false when no event has that id.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.events.iter_mut().find(|e| e.id == id) {
            Some(e) => {
                e.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for e in &mut self.events {
            e.read = true;
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        self.events.len() != before
    }

    pub fn unread_count(&self) -> usize {
        self.events.iter().filter(|e| !e.read).count()
    }

    pub fn events(&self) -> &[NotificationEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
