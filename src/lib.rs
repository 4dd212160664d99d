// src/lib.rs
// Public library surface for the service binary, utilities and integration tests.

pub mod aggregate;
pub mod api;
pub mod change_detector;
pub mod client;
pub mod config;
pub mod metrics;
pub mod monitor;
pub mod normalize;
pub mod notify;
pub mod scheduler;
pub mod store;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{aggregate, aggregate_at, AggregateSnapshot};
pub use crate::api::create_router;
pub use crate::change_detector::{ChangeDetector, DetectorPhase, PollState};
pub use crate::monitor::{Dashboard, DashboardView, Monitor};
pub use crate::normalize::{format_amount, normalize_price};
pub use crate::notify::{NotificationEvent, NotificationKind, NotificationLog};
pub use crate::store::{FileStore, KvStore, MemoryStore, WriteBehindStore};
