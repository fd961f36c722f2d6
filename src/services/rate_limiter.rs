use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::debug;

use crate::config::RateLimitConfig;

/// Result of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

#[cfg(test)]
impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Per-client sliding-window limiter.
///
/// Each key keeps the instants of its admitted requests inside the trailing
/// window. The prune/check/record sequence for a key runs under that key's
/// shard lock, so two concurrent callers can never both take the last slot.
pub struct SlidingWindowRateLimiter {
    max_requests: usize,
    window: Duration,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowRateLimiter {
    /// `max_requests = 0` disables limiting.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Admits or rejects one request for `client_key` at `now`.
    #[cfg(test)]
    pub fn admit(&self, client_key: &str, now: Instant) -> bool {
        self.check(client_key, now).is_allowed()
    }

    /// Admits or rejects one request, reporting how much budget is left or
    /// how long until the oldest request leaves the window.
    pub fn check(&self, client_key: &str, now: Instant) -> Admission {
        if !self.is_enabled() {
            return Admission::Allowed {
                remaining: usize::MAX,
            };
        }

        // Only allocate the key on first sight
        let mut timestamps = match self.windows.get_mut(client_key) {
            Some(entry) => entry,
            None => self.windows.entry(client_key.to_owned()).or_default(),
        };

        prune(&mut timestamps, now, self.window);

        if timestamps.len() >= self.max_requests {
            let retry_after = timestamps
                .iter()
                .min()
                .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
                .unwrap_or(self.window);
            debug!(
                "Rate limit hit for '{}' ({} requests in window)",
                client_key,
                timestamps.len()
            );
            return Admission::Limited { retry_after };
        }

        timestamps.push_back(now);
        Admission::Allowed {
            remaining: self.max_requests - timestamps.len(),
        }
    }

    /// Drops keys whose windows are empty at `now`. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.window;
        self.windows.retain(|_, timestamps| {
            prune(timestamps, now, window);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

// Callers may race on `now`, so entries are not guaranteed to be sorted
fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    timestamps.retain(|&t| now.saturating_duration_since(t) <= window);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_quota_then_window_expiry() {
        let limiter = SlidingWindowRateLimiter::new(3, Duration::from_millis(1000));
        let t = Instant::now();

        assert!(limiter.admit("k", t));
        assert!(limiter.admit("k", t));
        assert!(limiter.admit("k", t));
        assert!(!limiter.admit("k", t));
        assert!(limiter.admit("k", t + Duration::from_millis(1001)));
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let limiter = SlidingWindowRateLimiter::new(2, Duration::from_millis(1000));
        let t = Instant::now();

        assert!(limiter.admit("k", t));
        assert!(limiter.admit("k", t + Duration::from_millis(500)));
        // Rejected attempts must not extend the window
        for ms in [600, 700, 800, 900] {
            assert!(!limiter.admit("k", t + Duration::from_millis(ms)));
        }
        // First admission has expired, second is still inside
        assert!(limiter.admit("k", t + Duration::from_millis(1001)));
        assert!(!limiter.admit("k", t + Duration::from_millis(1002)));
    }

    #[test]
    fn test_keys_have_independent_budgets() {
        let limiter = SlidingWindowRateLimiter::new(1, Duration::from_secs(60));
        let t = Instant::now();

        assert!(limiter.admit("198.51.100.1", t));
        assert!(!limiter.admit("198.51.100.1", t));
        assert!(limiter.admit("198.51.100.2", t));
        assert!(limiter.admit("unknown", t));
    }

    #[test]
    fn test_check_reports_remaining_and_retry_after() {
        let limiter = SlidingWindowRateLimiter::new(2, Duration::from_secs(10));
        let t = Instant::now();

        assert_eq!(limiter.check("k", t), Admission::Allowed { remaining: 1 });
        assert_eq!(
            limiter.check("k", t + Duration::from_secs(4)),
            Admission::Allowed { remaining: 0 }
        );
        assert_eq!(
            limiter.check("k", t + Duration::from_secs(6)),
            Admission::Limited {
                retry_after: Duration::from_secs(4)
            }
        );
    }

    #[test]
    fn test_disabled_limiter_admits_everything() {
        let limiter = SlidingWindowRateLimiter::new(0, Duration::from_secs(1));
        let t = Instant::now();
        assert!(!limiter.is_enabled());
        for _ in 0..1000 {
            assert!(limiter.admit("k", t));
        }
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_sweep_removes_idle_keys() {
        let limiter = SlidingWindowRateLimiter::new(5, Duration::from_millis(100));
        let t = Instant::now();

        limiter.admit("idle", t);
        limiter.admit("busy", t + Duration::from_millis(150));
        assert_eq!(limiter.tracked_keys(), 2);

        let removed = limiter.sweep(t + Duration::from_millis(200));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
        // Swept keys start fresh
        assert_eq!(
            limiter.check("idle", t + Duration::from_millis(200)),
            Admission::Allowed { remaining: 4 }
        );
    }

    #[test]
    fn test_concurrent_admits_never_exceed_quota() {
        let limiter = Arc::new(SlidingWindowRateLimiter::new(5, Duration::from_secs(60)));
        let now = Instant::now();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || limiter.admit("shared", now))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 5);
    }
}
