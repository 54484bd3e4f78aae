//! Retry schedule: the single pending reconnect timer.
//!
//! There is no attempt limit and no exponential growth: every retry waits the
//! same fixed delay, optionally plus uniform jitter. [`RetrySchedule::schedule`]
//! aborts any timer that is still pending before arming a new one, so at most
//! one retry is ever outstanding.

use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::debug;

/// Owner of the pending reconnect timer.
#[derive(Debug)]
pub struct RetrySchedule {
    delay: Duration,
    jitter: Duration,
    pending: Option<JoinHandle<()>>,
}

impl RetrySchedule {
    /// Create a schedule with a fixed `delay` and up to `jitter` extra.
    pub fn new(delay: Duration, jitter: Duration) -> Self {
        Self {
            delay,
            jitter,
            pending: None,
        }
    }

    /// Base delay between a connection ending and the next attempt.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Delay for the next timer: the base delay plus a random share of the jitter.
    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        self.delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    /// Arm the timer: after the delay, `on_fire` runs once.
    ///
    /// Any pending timer is cancelled first. Must be called from within a
    /// Tokio runtime. Returns the delay that was armed.
    pub fn schedule<F>(&mut self, on_fire: F) -> Duration
    where
        F: FnOnce() + Send + 'static,
    {
        if self.cancel() {
            debug!("replaced pending retry timer");
        }
        let delay = self.next_delay();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        }));
        delay
    }

    /// Cancel the pending timer. Returns `true` if one had not fired yet.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    /// Whether a timer is armed and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for RetrySchedule {
    fn drop(&mut self) {
        let _ = self.cancel();
    }
}
