//! Periodic soft refresh tied to a view's lifetime.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::error::DashboardError;

pub const DEFAULT_REFRESH_EVERY: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub struct PollingScheduler {
    every: Duration,
}

impl Default for PollingScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_EVERY)
    }
}

impl PollingScheduler {
    pub fn new(every: Duration) -> Self {
        Self {
            every: every.max(Duration::from_millis(1)),
        }
    }

    /// Run `tick` every interval, first one interval from now.
    ///
    /// `is_attached` is checked before each tick; once it reports false the
    /// loop ends for good. A failed tick is logged and the next one proceeds.
    /// Must run inside a `tokio::task::LocalSet`.
    pub fn start<A, F, Fut>(&self, is_attached: A, mut tick: F) -> PollingHandle
    where
        A: Fn() -> bool + 'static,
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = Result<(), DashboardError>> + 'static,
    {
        let every = self.every;
        let task = tokio::task::spawn_local(async move {
            let mut interval = interval_at(Instant::now() + every, every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !is_attached() {
                    debug!("View detached, polling stopped");
                    break;
                }
                if let Err(e) = tick().await {
                    warn!("Auto refresh failed: {}", e);
                }
            }
        });
        PollingHandle { task: Some(task) }
    }
}

/// Cancels the poll loop when cancelled or dropped.
#[derive(Debug)]
pub struct PollingHandle {
    task: Option<JoinHandle<()>>,
}

impl PollingHandle {
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
