//! Call-rate governor shared by every external request site.
//!
//! Counts admissions inside a one-second window. Once the quota is used up
//! inside the window the caller sleeps for one full window and the window is
//! reset. The counter lives behind a single async mutex, so admission
//! decisions see a globally consistent count.

use std::time::Duration;

use log::debug;
use tokio::{sync::Mutex, time::Instant};

/// Default provider quota (calls per second).
pub const DEFAULT_QUOTA: u32 = 80;

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct RateWindow {
    started: Instant,
    calls: u32,
}

/// What `admit` has to do before counting the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// Quota left in the current window
    Proceed,
    /// Window elapsed, start a fresh one without waiting
    Reset,
    /// Quota exhausted inside the window, sleep one window then reset
    Suspend,
}

#[derive(Debug)]
pub struct RateGovernor {
    quota: u32,
    window: Duration,
    state: Mutex<RateWindow>,
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA)
    }
}

impl RateGovernor {
    pub fn new(quota: u32) -> Self {
        Self::with_window(quota, WINDOW)
    }

    pub fn with_window(quota: u32, window: Duration) -> Self {
        Self {
            quota: quota.max(1),
            window,
            state: Mutex::new(RateWindow {
                started: Instant::now(),
                calls: 0,
            }),
        }
    }

    pub fn quota(&self) -> u32 {
        self.quota
    }

    fn decide(&self, window: &RateWindow, now: Instant) -> Admission {
        let elapsed = now.saturating_duration_since(window.started);
        if elapsed > self.window {
            Admission::Reset
        } else if window.calls >= self.quota {
            Admission::Suspend
        } else {
            Admission::Proceed
        }
    }

    /// Wait until one more external call fits the quota, then count it.
    ///
    /// The lock is held across the suspension so queued callers are admitted
    /// against the fresh window in arrival order.
    pub async fn admit(&self) {
        let mut window = self.state.lock().await;

        match self.decide(&window, Instant::now()) {
            Admission::Proceed => {},
            Admission::Reset => {
                window.started = Instant::now();
                window.calls = 0;
            },
            Admission::Suspend => {
                debug!(
                    "[RPC] Quota of {} calls reached, suspending for {:?}",
                    self.quota, self.window
                );
                tokio::time::sleep(self.window).await;
                window.started = Instant::now();
                window.calls = 0;
            },
        }

        window.calls += 1;
    }

    /// Calls admitted in the current window.
    pub async fn calls_in_window(&self) -> u32 {
        self.state.lock().await.calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_calls_within_quota_do_not_wait() {
        let governor = RateGovernor::new(5);
        let start = Instant::now();

        for _ in 0..5 {
            governor.admit().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(governor.calls_in_window().await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_over_quota_waits_one_window() {
        let governor = RateGovernor::new(3);

        for _ in 0..3 {
            governor.admit().await;
        }

        let start = Instant::now();
        governor.admit().await;
        let waited = start.elapsed();

        assert!(waited >= Duration::from_secs(1));
        assert!(waited < Duration::from_millis(1_100));
        assert_eq!(governor.calls_in_window().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_window_resets_without_waiting() {
        let governor = RateGovernor::new(2);
        governor.admit().await;
        governor.admit().await;

        tokio::time::advance(Duration::from_millis(1_500)).await;

        let start = Instant::now();
        governor.admit().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(governor.calls_in_window().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_count() {
        let governor = std::sync::Arc::new(RateGovernor::new(4));
        let start = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let governor = governor.clone();
                tokio::spawn(async move { governor.admit().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // 4 admitted immediately, the 5th waits one window, 6..8 share it
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(governor.calls_in_window().await, 4);
    }
}
