//! Job queue client.
//!
//! Long-running harvests are handed off, never executed in-process:
//! the engine enqueues a job keyed by handler name with an opaque JSON
//! payload and the external queue does the rest. Same JSON-over-RPC
//! convention as the sink (`POST {base}/jobs/<method>`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use webharvest_shared::{HarvestError, Result};

use crate::projector::SOURCE;

/// Handler names the queue routes webharvest jobs by.
pub mod handlers {
    pub const SCRAPE: &str = "webharvest.scrape";
    pub const SCRAPE_FEED: &str = "webharvest.scrape-feed";
    pub const SCRAPE_SITEMAP: &str = "webharvest.scrape-sitemap";
    pub const CRAWL: &str = "webharvest.crawl";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub current: i64,
    pub total: i64,
}

/// An async job as the queue tracks it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: String,
    pub handler_name: String,
    /// Opaque payload interpreted by the handler.
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub source: String,
    /// queued, running, paused, completed, failed, cancelled.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: JobProgress,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub parent_job_id: String,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub started_at: i64,
    #[serde(default)]
    pub completed_at: i64,
}

impl Job {
    fn queued(handler_name: &str, payload: serde_json::Value) -> Self {
        Self {
            handler_name: handler_name.to_string(),
            payload,
            source: SOURCE.to_string(),
            status: "queued".to_string(),
            ..Default::default()
        }
    }

    pub fn scrape(url: &str, actor: &str, extract_all: bool) -> Self {
        Self::queued(
            handlers::SCRAPE,
            serde_json::json!({
                "url": url,
                "actor": actor,
                "extract_all": extract_all,
            }),
        )
    }

    pub fn scrape_feed(url: &str, actor: &str) -> Self {
        Self::queued(
            handlers::SCRAPE_FEED,
            serde_json::json!({
                "url": url,
                "actor": actor,
            }),
        )
    }

    pub fn scrape_sitemap(url: &str, actor: &str, follow_nested: bool) -> Self {
        Self::queued(
            handlers::SCRAPE_SITEMAP,
            serde_json::json!({
                "url": url,
                "actor": actor,
                "follow_nested": follow_nested,
            }),
        )
    }

    pub fn crawl(url: &str, actor: &str, max_pages: usize, same_domain_only: bool) -> Self {
        Self::queued(
            handlers::CRAWL,
            serde_json::json!({
                "url": url,
                "actor": actor,
                "max_pages": max_pages,
                "same_domain_only": same_domain_only,
            }),
        )
    }
}

/// Narrow interface to the external job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job, returning its queue-assigned ID.
    async fn enqueue(&self, job: &Job) -> Result<String>;

    async fn get_job(&self, id: &str) -> Result<Job>;

    /// List jobs, optionally filtered by status.
    async fn list_jobs(&self, status: Option<&str>, limit: u32) -> Result<Vec<Job>>;
}

// ---------------------------------------------------------------------------
// HTTP client implementation
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EnqueueRequest<'a> {
    auth_token: &'a str,
    job: &'a Job,
}

#[derive(Deserialize)]
struct EnqueueResponse {
    success: bool,
    #[serde(default)]
    job_id: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct GetJobRequest<'a> {
    auth_token: &'a str,
    job_id: &'a str,
}

#[derive(Deserialize)]
struct GetJobResponse {
    success: bool,
    #[serde(default)]
    job: Option<Job>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct ListJobsRequest<'a> {
    auth_token: &'a str,
    status: &'a str,
    limit: u32,
}

#[derive(Deserialize)]
struct ListJobsResponse {
    success: bool,
    #[serde(default)]
    jobs: Vec<Job>,
    #[serde(default)]
    error: Option<String>,
}

/// JSON-over-RPC queue client.
pub struct HttpQueue {
    client: reqwest::Client,
    base: String,
    auth_token: String,
}

impl HttpQueue {
    pub fn new(endpoint: &str, auth_token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| HarvestError::Queue(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            base: endpoint.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
        })
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        request: &Req,
    ) -> Result<Resp> {
        let url = format!("{}/jobs/{method}", self.base);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| HarvestError::Queue(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Queue(format!("{url}: HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| HarvestError::Queue(format!("{url}: invalid response: {e}")))
    }
}

#[async_trait]
impl JobQueue for HttpQueue {
    async fn enqueue(&self, job: &Job) -> Result<String> {
        let response: EnqueueResponse = self
            .post(
                "enqueue",
                &EnqueueRequest {
                    auth_token: &self.auth_token,
                    job,
                },
            )
            .await?;

        if !response.success {
            return Err(HarvestError::Queue(format!(
                "failed to enqueue job: {}",
                response.error.unwrap_or_default()
            )));
        }

        Ok(response.job_id)
    }

    async fn get_job(&self, id: &str) -> Result<Job> {
        let response: GetJobResponse = self
            .post(
                "get",
                &GetJobRequest {
                    auth_token: &self.auth_token,
                    job_id: id,
                },
            )
            .await?;

        if !response.success {
            return Err(HarvestError::Queue(format!(
                "failed to get job: {}",
                response.error.unwrap_or_default()
            )));
        }

        response
            .job
            .ok_or_else(|| HarvestError::Queue(format!("job {id} not found")))
    }

    async fn list_jobs(&self, status: Option<&str>, limit: u32) -> Result<Vec<Job>> {
        let response: ListJobsResponse = self
            .post(
                "list",
                &ListJobsRequest {
                    auth_token: &self.auth_token,
                    status: status.unwrap_or(""),
                    limit,
                },
            )
            .await?;

        if !response.success {
            return Err(HarvestError::Queue(format!(
                "failed to list jobs: {}",
                response.error.unwrap_or_default()
            )));
        }

        Ok(response.jobs)
    }
}
