//! Attestation sink client.
//!
//! The sink is an external fact store with a narrow, method-oriented
//! surface. [`AttestationSink`] is the seam the engine and crawler
//! depend on; [`HttpSink`] speaks the JSON-over-RPC convention
//! (`POST {base}/attestations/<method>` with the auth token in the
//! body). The sink derives attestation IDs from command content.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use webharvest_shared::{HarvestError, Result};

use crate::command::{Attestation, AttestationCommand, AttestationFilter};

/// Narrow interface to the external attestation store.
#[async_trait]
pub trait AttestationSink: Send + Sync {
    /// Create an attestation, letting the sink derive its ID from the
    /// command content. Returns the stored attestation.
    async fn generate_and_create(&self, command: &AttestationCommand) -> Result<Attestation>;

    /// Whether an attestation with this ID exists.
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Query attestations matching a filter.
    async fn query(&self, filter: &AttestationFilter) -> Result<Vec<Attestation>>;
}

// ---------------------------------------------------------------------------
// HTTP client implementation
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GenerateRequest<'a> {
    auth_token: &'a str,
    command: &'a AttestationCommand,
}

#[derive(Deserialize)]
struct GenerateResponse {
    success: bool,
    #[serde(default)]
    attestation: Option<Attestation>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct ExistsRequest<'a> {
    auth_token: &'a str,
    id: &'a str,
}

#[derive(Deserialize)]
struct ExistsResponse {
    exists: bool,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    auth_token: &'a str,
    filter: &'a AttestationFilter,
}

#[derive(Deserialize)]
struct QueryResponse {
    success: bool,
    #[serde(default)]
    attestations: Vec<Attestation>,
    #[serde(default)]
    error: Option<String>,
}

/// JSON-over-RPC sink client.
pub struct HttpSink {
    client: reqwest::Client,
    base: String,
    auth_token: String,
}

impl HttpSink {
    pub fn new(endpoint: &str, auth_token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| HarvestError::Sink(format!("failed to build client: {e}")))?;

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
        let url = format!("{}/attestations/{method}", self.base);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| HarvestError::Sink(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Sink(format!("{url}: HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| HarvestError::Sink(format!("{url}: invalid response: {e}")))
    }
}

#[async_trait]
impl AttestationSink for HttpSink {
    async fn generate_and_create(&self, command: &AttestationCommand) -> Result<Attestation> {
        let response: GenerateResponse = self
            .post(
                "generate",
                &GenerateRequest {
                    auth_token: &self.auth_token,
                    command,
                },
            )
            .await?;

        if !response.success {
            return Err(HarvestError::Sink(format!(
                "failed to create attestation: {}",
                response.error.unwrap_or_default()
            )));
        }

        response
            .attestation
            .ok_or_else(|| HarvestError::Sink("sink returned no attestation".into()))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let response: ExistsResponse = self
            .post(
                "exists",
                &ExistsRequest {
                    auth_token: &self.auth_token,
                    id,
                },
            )
            .await?;
        Ok(response.exists)
    }

    async fn query(&self, filter: &AttestationFilter) -> Result<Vec<Attestation>> {
        let response: QueryResponse = self
            .post(
                "query",
                &QueryRequest {
                    auth_token: &self.auth_token,
                    filter,
                },
            )
            .await?;

        if !response.success {
            return Err(HarvestError::Sink(format!(
                "failed to query attestations: {}",
                response.error.unwrap_or_default()
            )));
        }

        Ok(response.attestations)
    }
}
