//! Polite-fetch discipline for webharvest.
//!
//! This crate provides:
//! - [`guard`] — SSRF admission policy (scheme/host/IP checks, DNS re-resolve)
//! - [`client`] — size-capped streaming HTTP fetcher
//! - [`robots`] — per-origin robots.txt cache
//! - [`rate`] — per-host request spacing
//! - [`PoliteFetcher`] — the four composed in policy order

pub mod client;
pub mod guard;
pub mod rate;
pub mod robots;

use std::time::Duration;

use url::Url;

use webharvest_shared::{EngineConfig, HarvestError, Result};

pub use client::{FetchedBody, Fetcher};
pub use rate::RateLimiter;
pub use robots::{RobotsCache, RobotsEntry};

/// A fetcher that refuses unsafe targets, honors robots.txt, and spaces
/// requests per host. All workflows of one engine share this: the robots
/// cache, rate state, and HTTP connection pool live here.
pub struct PoliteFetcher {
    config: EngineConfig,
    fetcher: Fetcher,
    robots: RobotsCache,
    limiter: RateLimiter,
}

impl PoliteFetcher {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let fetcher = Fetcher::new(
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
            config.max_response_size,
        )?;
        let robots = RobotsCache::new(&config.user_agent);
        let limiter = RateLimiter::new(config.min_interval());

        Ok(Self {
            config,
            fetcher,
            robots,
            limiter,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch a URL under the full polite-fetch policy:
    /// guard admission → robots authorization → per-host spacing → GET.
    ///
    /// The robots.txt fetch for a new origin happens before the rate
    /// gate and is not itself robots-checked.
    pub async fn fetch(&self, url: &Url, expected_types: &[&str]) -> Result<FetchedBody> {
        guard::admit(url, self.config.allow_private_ips).await?;

        let mut crawl_delay = None;
        if self.config.respect_robots {
            let entry = self.robots.entry(&self.fetcher, url).await;
            if !entry.allowed(url) {
                return Err(HarvestError::policy(format!("blocked by robots.txt: {url}")));
            }
            crawl_delay = entry.crawl_delay();
        }

        if let Some(host) = url.host_str() {
            self.limiter.acquire(host, crawl_delay).await;
        }

        self.fetcher.fetch(url, expected_types).await
    }
}
