//! Per-origin robots.txt cache.
//!
//! Each origin's `/robots.txt` is fetched exactly once per process run
//! and the parsed decision object is cached forever. A missing,
//! non-2xx, or unparseable robots.txt yields an unrestricted entry.
//! Concurrent first accessors race on a per-origin once-cell: one
//! fetches, the rest await the completed entry.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use texting_robots::Robot;
use tokio::sync::OnceCell;
use url::Url;

use crate::client::Fetcher;

/// Cached robots decision for one origin.
pub struct RobotsEntry {
    robot: Robot,
}

impl RobotsEntry {
    /// Whether the configured user agent may fetch this URL.
    pub fn allowed(&self, url: &Url) -> bool {
        self.robot.allowed(url.as_str())
    }

    /// `Crawl-delay` for the configured user agent, if any.
    pub fn crawl_delay(&self) -> Option<Duration> {
        self.robot.delay.map(|secs| Duration::from_secs(secs as u64))
    }
}

/// Process-lifetime cache of robots decisions, keyed by origin.
pub struct RobotsCache {
    entries: DashMap<String, Arc<OnceCell<Arc<RobotsEntry>>>>,
    /// Product token matched against `User-agent:` lines — the part of
    /// the configured User-Agent before the version ("Harvester/0.2"
    /// matches `User-agent: Harvester`).
    agent_token: String,
}

impl RobotsCache {
    pub fn new(user_agent: &str) -> Self {
        let agent_token = user_agent
            .split(['/', ' '])
            .next()
            .unwrap_or(user_agent)
            .to_string();
        Self {
            entries: DashMap::new(),
            agent_token,
        }
    }

    /// Get (fetching on first use) the robots entry for a URL's origin.
    ///
    /// The robots.txt fetch goes through the size-capped fetcher but is
    /// itself neither robots-checked nor rate limited.
    pub async fn entry(&self, fetcher: &Fetcher, url: &Url) -> Arc<RobotsEntry> {
        let origin = url.origin().ascii_serialization();
        let cell = self
            .entries
            .entry(origin.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| async {
            Arc::new(self.fetch_entry(fetcher, &origin).await)
        })
        .await
        .clone()
    }

    async fn fetch_entry(&self, fetcher: &Fetcher, origin: &str) -> RobotsEntry {
        let body = match Url::parse(&format!("{origin}/robots.txt")) {
            Ok(robots_url) => match fetcher.fetch(&robots_url, &[]).await {
                Ok(fetched) => fetched.bytes,
                Err(e) => {
                    tracing::debug!(origin, error = %e, "robots.txt unavailable, unrestricted");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        let robot = Robot::new(&self.agent_token, &body).unwrap_or_else(|e| {
            tracing::debug!(origin, error = %e, "robots.txt unparseable, unrestricted");
            Robot::new(&self.agent_token, b"").expect("empty robots.txt always parses")
        });

        RobotsEntry { robot }
    }
}
