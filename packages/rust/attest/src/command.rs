//! Attestation wire types and the predicate vocabulary.
//!
//! An attestation is an immutable fact of shape (subjects, predicates,
//! contexts, actors, timestamp, attributes) whose identifier the sink
//! derives from its content. The harvester only ever builds commands;
//! IDs and creation timestamps come back from the sink.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The fixed vocabulary of relations the harvester emits.
pub mod predicates {
    pub const HAS_TITLE: &str = "has_title";
    pub const HAS_META_DESCRIPTION: &str = "has_meta_description";
    pub const HAS_CANONICAL_URL: &str = "has_canonical_url";
    pub const AUTHORED_BY: &str = "authored_by";
    pub const PUBLISHED_AT: &str = "published_at";
    pub const HAS_IMAGE: &str = "has_image";
    pub const HAS_STRUCTURED_DATA: &str = "has_structured_data";
    pub const LINKS_TO: &str = "links_to";
    pub const LINKS_EXTERNALLY_TO: &str = "links_externally_to";
    pub const FEED_CONTAINS: &str = "feed_contains";
    pub const SITEMAP_CONTAINS: &str = "sitemap_contains";
}

/// Command for creating an attestation with a sink-generated ID.
///
/// `timestamp` 0 means "now" on the sink side; the projector always
/// leaves it 0 so identical records project to identical commands.
/// Attributes are ordered (BTreeMap) for the same reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationCommand {
    pub subjects: Vec<String>,
    pub predicates: Vec<String>,
    pub contexts: Vec<String>,
    pub actors: Vec<String>,
    pub timestamp: i64,
    pub attributes: BTreeMap<String, String>,
}

impl AttestationCommand {
    /// A single-subject, single-predicate, single-context command. An
    /// empty actor yields an empty actors list, passed through to the
    /// sink as-is.
    pub fn new(subject: &str, predicate: &str, context: &str, actor: &str) -> Self {
        Self {
            subjects: vec![subject.to_string()],
            predicates: vec![predicate.to_string()],
            contexts: vec![context.to_string()],
            actors: if actor.is_empty() {
                Vec::new()
            } else {
                vec![actor.to_string()]
            },
            timestamp: 0,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// An attestation as the sink stores it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attestation {
    pub id: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub predicates: Vec<String>,
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: i64,
}

/// Filter for querying the sink. Empty vectors and zero values mean
/// "no constraint".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttestationFilter {
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub predicates: Vec<String>,
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub time_start: i64,
    #[serde(default)]
    pub time_end: i64,
    #[serde(default)]
    pub limit: u32,
}

impl AttestationFilter {
    /// Filter on one (subject, predicate) pair, limited to one result —
    /// the existence probe the crawler uses.
    pub fn subject_predicate(subject: &str, predicate: &str) -> Self {
        Self {
            subjects: vec![subject.to_string()],
            predicates: vec![predicate.to_string()],
            limit: 1,
            ..Default::default()
        }
    }
}
