//! The plugin service surface: Metadata / Initialize / Shutdown /
//! HandleHTTP / Health.
//!
//! The RPC framing lives outside this crate; whatever hosts the plugin
//! deserializes its wire messages into these types and calls straight
//! through. Initialize builds the engine (and the sink/queue clients
//! when endpoints are given); Shutdown drops it, closing the clients.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use webharvest_attest::{AttestationSink, HttpQueue, HttpSink, JobQueue};
use webharvest_shared::{EngineConfig, Result};

use crate::engine::HarvestEngine;
use crate::router::{HttpRequest, HttpResponse, route};

/// Static plugin description, served by `Metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
    pub description: String,
    pub author: String,
    pub license: String,
}

/// Everything `Initialize` carries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitializeOptions {
    /// Attestation sink endpoint; empty = no sink.
    #[serde(default)]
    pub sink_endpoint: String,
    /// Job queue endpoint; empty = no queue.
    #[serde(default)]
    pub queue_endpoint: String,
    /// Auth token passed to both clients.
    #[serde(default)]
    pub auth_token: String,
    /// Engine config as a flat string map (see [`EngineConfig::from_map`]).
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// Health report, served by `Health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
    pub details: BTreeMap<String, String>,
}

/// The plugin servicer. Thread-safe: requests may arrive concurrently,
/// all sharing one engine behind the lock.
pub struct HarvesterPlugin {
    engine: RwLock<Option<Arc<HarvestEngine>>>,
}

impl HarvesterPlugin {
    pub fn new() -> Self {
        Self {
            engine: RwLock::new(None),
        }
    }

    pub fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: "webharvest".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: ">=0.1.0".into(),
            description: "Web harvesting plugin with feed/sitemap support, robots.txt, \
                          and rate limiting"
                .into(),
            author: "webharvest".into(),
            license: "MIT".into(),
        }
    }

    /// Build the engine and clients. Replaces any previous engine.
    pub async fn initialize(&self, options: InitializeOptions) -> Result<()> {
        info!(
            sink_endpoint = %options.sink_endpoint,
            queue_endpoint = %options.queue_endpoint,
            "initializing webharvest plugin"
        );

        let config = EngineConfig::from_map(&options.config)?;

        let sink: Option<Arc<dyn AttestationSink>> = if options.sink_endpoint.is_empty() {
            None
        } else {
            Some(Arc::new(HttpSink::new(
                &options.sink_endpoint,
                &options.auth_token,
            )?))
        };

        let queue: Option<Arc<dyn JobQueue>> = if options.queue_endpoint.is_empty() {
            None
        } else {
            Some(Arc::new(HttpQueue::new(
                &options.queue_endpoint,
                &options.auth_token,
            )?))
        };

        let engine = HarvestEngine::new(config, sink, queue)?;
        *self.engine.write().await = Some(Arc::new(engine));

        info!("webharvest plugin initialized");
        Ok(())
    }

    /// Drop the engine and its clients. Subsequent requests get 503
    /// until the next Initialize.
    pub async fn shutdown(&self) {
        if self.engine.write().await.take().is_some() {
            info!("webharvest plugin shut down");
        }
    }

    /// Dispatch one HTTP-shaped request (see the router for the table).
    pub async fn handle_http(&self, request: &HttpRequest) -> HttpResponse {
        let engine = self.engine.read().await.clone();
        match engine {
            Some(engine) => route(&engine, request).await,
            None => HttpResponse::error(503, "plugin not initialized"),
        }
    }

    pub async fn health(&self) -> HealthStatus {
        let engine = self.engine.read().await.clone();
        let mut details = BTreeMap::new();

        match engine {
            Some(engine) => {
                details.insert(
                    "sink".into(),
                    if engine.has_sink() {
                        "connected".into()
                    } else {
                        "not connected".into()
                    },
                );
                details.insert(
                    "queue".into(),
                    if engine.has_queue() {
                        "connected".into()
                    } else {
                        "not configured".into()
                    },
                );
                details.insert(
                    "respect_robots".into(),
                    engine.config().respect_robots.to_string(),
                );
                details.insert("rate_limit".into(), engine.config().rate_limit.to_string());

                HealthStatus {
                    healthy: true,
                    message: "OK".into(),
                    details,
                }
            }
            None => HealthStatus {
                healthy: false,
                message: "not initialized".into(),
                details,
            },
        }
    }
}

impl Default for HarvesterPlugin {
    fn default() -> Self {
        Self::new()
    }
}
