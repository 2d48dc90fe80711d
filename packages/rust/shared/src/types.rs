//! Domain records produced by the harvest pipelines.
//!
//! These are request-scoped: a workflow builds one record per fetched
//! resource, the projector turns it into attestation commands, and the
//! router serializes it back to the caller. Nothing here is persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Links and pages
// ---------------------------------------------------------------------------

/// A hyperlink extracted from a page, absolutized against the page URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLink {
    /// The page the link was found on.
    pub source_url: String,
    /// Absolute http(s) target.
    pub target_url: String,
    /// Flattened visible text of the anchor, stripped.
    pub anchor_text: String,
    /// `rel` attribute tokens, split on whitespace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rel: Vec<String>,
    /// True when the target host differs from the source host.
    pub is_external: bool,
}

/// An `<img>` found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Absolutized image source.
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Only set when the attribute is fully numeric.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// One decoded `application/ld+json` script (or `@graph` member).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDatum {
    /// The `@type` of the datum.
    #[serde(rename = "type")]
    pub datum_type: String,
    /// The raw JSON value.
    pub data: serde_json::Value,
}

/// Extended page metadata from `<meta>`, `<link>`, and `<html>` tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_card: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_image: Option<String>,
    /// `<link rel=canonical>`, absolutized against the page URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    /// `<html lang>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Result of harvesting one HTML page.
///
/// Fetch and policy failures are captured in `error` rather than
/// propagated; `status_code` is 0 unless the server answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub status_code: u16,
    pub links: Vec<ExtractedLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structured_data: Vec<StructuredDatum>,
    /// Heading texts keyed by level ("h1".."h6"), document order within
    /// each level. Levels with no headings are absent.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headings: BTreeMap<String, Vec<String>>,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageRecord {
    /// An empty record carrying a failure, for URLs that never produced
    /// a parseable body.
    pub fn failed(url: impl Into<String>, status_code: u16, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            status_code,
            links: Vec::new(),
            meta: None,
            images: Vec::new(),
            structured_data: Vec::new(),
            headings: BTreeMap::new(),
            fetched_at: Utc::now(),
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

/// Detected syndication format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    Rss,
    Atom,
    Unknown,
}

impl FeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::Atom => "atom",
            Self::Unknown => "unknown",
        }
    }
}

/// A single feed entry, normalized across RSS and Atom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

/// Result of harvesting an RSS or Atom feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedRecord {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub feed_type: FeedType,
    pub items: Vec<FeedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeedRecord {
    /// A record for a feed that could not be fetched or parsed.
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            description: None,
            feed_type: FeedType::Unknown,
            items: Vec::new(),
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Sitemaps
// ---------------------------------------------------------------------------

/// One `<url>` block of a sitemap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub loc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<String>,
    /// 0.5 when absent or unparseable.
    pub priority: f64,
}

/// Result of harvesting one sitemap document (urlset or index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapRecord {
    pub url: String,
    pub urls: Vec<SitemapEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_sitemaps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SitemapRecord {
    /// A record for a sitemap that could not be fetched or parsed.
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            urls: Vec::new(),
            nested_sitemaps: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_record_serialization_skips_empty() {
        let record = PageRecord::failed("http://example.com/", 0, "refused");
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["url"], "http://example.com/");
        assert_eq!(json["status_code"], 0);
        assert_eq!(json["error"], "refused");
        // Empty collections and absent meta stay out of the payload.
        assert!(json.get("images").is_none());
        assert!(json.get("meta").is_none());
        assert!(json.get("headings").is_none());
    }

    #[test]
    fn feed_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&FeedType::Rss).expect("serialize"),
            "\"rss\""
        );
        assert_eq!(
            serde_json::to_string(&FeedType::Unknown).expect("serialize"),
            "\"unknown\""
        );
    }

    #[test]
    fn sitemap_entry_roundtrip() {
        let entry = SitemapEntry {
            loc: "http://example.com/p1".into(),
            lastmod: Some("2024-01-01".into()),
            changefreq: None,
            priority: 0.9,
        };
        let json = serde_json::to_string(&entry).expect("serialize");
        let parsed: SitemapEntry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, entry);
    }
}
