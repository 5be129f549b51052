//! Fixed-window rate limiter keyed by API key id.
//!
//! Counters live in process memory only, so a restart resets every limit.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

/// Per-key counter for the current window.
#[derive(Debug, Clone)]
pub struct RateWindow {
    pub key_id: Uuid,
    pub window_start: Instant,
    pub count: u32,
}

impl RateWindow {
    fn new(key_id: Uuid, now: Instant) -> Self {
        Self {
            key_id,
            window_start: now,
            count: 0,
        }
    }

    fn expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }
}

pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    windows: Mutex<HashMap<Uuid, RateWindow>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request for `key_id` and report whether it is within the limit.
    pub async fn admit(&self, key_id: Uuid) -> bool {
        self.admit_at(key_id, Instant::now()).await
    }

    /// [`admit`](Self::admit) with an explicit clock.
    ///
    /// Increment and compare happen under one lock, so concurrent callers
    /// for the same key can never be admitted past the limit.
    pub async fn admit_at(&self, key_id: Uuid, now: Instant) -> bool {
        let mut windows = self.windows.lock().await;
        let entry = windows
            .entry(key_id)
            .or_insert_with(|| RateWindow::new(key_id, now));

        if entry.expired(now, self.window) {
            *entry = RateWindow::new(key_id, now);
        }

        entry.count = entry.count.saturating_add(1);
        let admitted = entry.count <= self.max_requests;

        if !admitted {
            tracing::debug!(
                %key_id,
                count = entry.count,
                limit = self.max_requests,
                "rate limit exceeded"
            );
        }

        admitted
    }

    /// Drop windows that have already rolled over.
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        let window = self.window;
        self.windows
            .lock()
            .await
            .retain(|_, w| !w.expired(now, window));
    }

    /// Number of keys with a live window.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_exactly_limit_admitted() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 3);
        let key = Uuid::new_v4();
        let now = Instant::now();

        for i in 0..3 {
            assert!(limiter.admit_at(key, now).await, "request {} rejected", i + 1);
        }
        assert!(!limiter.admit_at(key, now).await);
        assert!(!limiter.admit_at(key, now).await);
    }

    #[tokio::test]
    async fn test_window_rollover() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let key = Uuid::new_v4();
        let start = Instant::now();

        assert!(limiter.admit_at(key, start).await);
        assert!(!limiter.admit_at(key, start + Duration::from_secs(59)).await);
        assert!(limiter.admit_at(key, start + Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();

        assert!(limiter.admit_at(Uuid::new_v4(), now).await);
        assert!(limiter.admit_at(Uuid::new_v4(), now).await);
    }

    #[tokio::test]
    async fn test_concurrent_admits_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), 10));
        let key = Uuid::new_v4();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.admit(key).await })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let limiter = RateLimiter::new(Duration::from_millis(10), 5);
        limiter.admit(Uuid::new_v4()).await;
        assert_eq!(limiter.tracked_keys().await, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        limiter.purge_expired().await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
