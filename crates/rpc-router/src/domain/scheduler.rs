//! Cancellable timers.
//!
//! A [`ScheduledTask`] owns a tokio task; dropping the handle aborts it.

use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Handle to a delayed or periodic job. Aborted on drop.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `job` once after `delay`. `None` outside a tokio runtime.
    pub fn after<F>(delay: Duration, job: F) -> Option<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn(async move {
            tokio::time::sleep(delay).await;
            job();
        })
    }

    /// Run `job` every `period`, first after one period. The job returns
    /// false to stop.
    pub fn every<F>(period: Duration, mut job: F) -> Option<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        Self::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !job() {
                    break;
                }
            }
        })
    }

    fn spawn<Fut>(future: Fut) -> Option<Self>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = Handle::try_current().ok()?.spawn(future);
        Some(Self { handle })
    }

    /// Whether the job has completed or was aborted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort now.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
