//! Per-host request spacing.
//!
//! Enforces a minimum interval between two fetches to the same host:
//! `max(1/rps, robots crawl-delay)`. The per-host lock is held across
//! the sleep, so concurrent workflows targeting one host queue up FIFO
//! behind the same gate. Hosts never contend with each other.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

/// Per-host token-spacing limiter. State lives with the engine process.
pub struct RateLimiter {
    /// Floor from the rps knob; zero disables it.
    min_interval: Duration,
    /// Last request instant per host, created lazily.
    hosts: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            hosts: DashMap::new(),
        }
    }

    /// Wait until this host may be fetched again, then claim the slot.
    pub async fn acquire(&self, host: &str, crawl_delay: Option<Duration>) {
        let spacing = self.min_interval.max(crawl_delay.unwrap_or(Duration::ZERO));
        if spacing.is_zero() {
            return;
        }

        let cell = self
            .hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut last = cell.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < spacing {
                tokio::time::sleep(spacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spaces_successive_requests() {
        // 10 rps ⇒ 100 ms between requests to one host.
        let limiter = RateLimiter::new(Duration::from_millis(100));

        let start = Instant::now();
        limiter.acquire("example.com", None).await;
        limiter.acquire("example.com", None).await;

        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn hosts_do_not_contend() {
        let limiter = RateLimiter::new(Duration::from_millis(200));

        let start = Instant::now();
        limiter.acquire("a.example.com", None).await;
        limiter.acquire("b.example.com", None).await;

        // Different hosts: no spacing between them.
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn crawl_delay_stretches_spacing() {
        let limiter = RateLimiter::new(Duration::from_millis(10));

        let start = Instant::now();
        limiter.acquire("example.com", Some(Duration::from_millis(150))).await;
        limiter.acquire("example.com", Some(Duration::from_millis(150))).await;

        assert!(start.elapsed() >= Duration::from_millis(140));
    }

    #[tokio::test]
    async fn disabled_when_zero() {
        let limiter = RateLimiter::new(Duration::ZERO);

        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire("example.com", None).await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
