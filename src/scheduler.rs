// src/scheduler.rs
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shortest accepted interval; guards against busy loops from bad config.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// A cancellable fixed-interval job.
///
/// The first tick fires immediately. A tick that overruns its period delays
/// the next one instead of piling up. `stop()` (or dropping the task) aborts
/// the loop, including a tick that is mid-flight.
pub struct PollTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl PollTask {
    pub fn spawn<F, Fut>(name: &'static str, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = interval.max(MIN_INTERVAL);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tick().await;
            }
        });
        tracing::debug!(target: "scheduler", task = name, period_secs = period.as_secs(), "poll task started");
        Self {
            name,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(h) = self.handle.take() {
            h.abort();
            tracing::debug!(target: "scheduler", task = self.name, "poll task stopped");
        }
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_stopped() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let mut task = PollTask::spawn("test", Duration::from_secs(15), move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3); // t=0, 15, 30
        assert!(task.is_running());

        task.stop();
        tokio::task::yield_now().await;
        assert!(!task.is_running());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _task = PollTask::spawn("fast", Duration::ZERO, move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3); // t=0, 1, 2
    }
}
