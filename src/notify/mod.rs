// src/notify/mod.rs
//! Dashboard notification events and their bounded, persisted log.

pub mod log;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use log::{NotificationLog, MAX_NOTIFICATIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    #[serde(alias = "new_works")]
    NewItems,
    #[serde(alias = "session_completed")]
    SessionSucceeded,
    #[serde(alias = "session_error")]
    SessionFailed,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewItems => "new-items",
            Self::SessionSucceeded => "session-succeeded",
            Self::SessionFailed => "session-failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: String,
    #[serde(alias = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(alias = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl NotificationEvent {
    pub fn new(
        id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            message: message.into(),
            created_at,
            read: false,
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}
