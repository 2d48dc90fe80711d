//! Attestation commands, record projection, and the external service
//! clients (fact-store sink and job queue).
//!
//! This crate provides:
//! - [`command`] — attestation wire types and the predicate vocabulary
//! - [`projector`] — deterministic record → command projection
//! - [`sink`] — [`AttestationSink`] trait + JSON-over-RPC client
//! - [`queue`] — [`JobQueue`] trait + JSON-over-RPC client

pub mod command;
pub mod projector;
pub mod queue;
pub mod sink;

pub use command::{Attestation, AttestationCommand, AttestationFilter, predicates};
pub use projector::{SOURCE, project_feed, project_page, project_sitemap};
pub use queue::{HttpQueue, Job, JobProgress, JobQueue, handlers};
pub use sink::{AttestationSink, HttpSink};
