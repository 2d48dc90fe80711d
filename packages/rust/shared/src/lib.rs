//! Shared types, error model, and configuration for webharvest.
//!
//! This crate is the foundation depended on by all other webharvest crates.
//! It provides:
//! - [`HarvestError`] — the unified error type
//! - Harvest records ([`PageRecord`], [`FeedRecord`], [`SitemapRecord`], …)
//! - Configuration ([`EngineConfig`], [`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EngineConfig, ServicesConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{HarvestError, Result};
pub use types::{
    ExtractedLink, FeedItem, FeedRecord, FeedType, ImageRecord, MetaRecord, PageRecord,
    SitemapEntry, SitemapRecord, StructuredDatum,
};
