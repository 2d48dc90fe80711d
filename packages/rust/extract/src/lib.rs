//! Parsers for the four resource shapes webharvest understands.
//!
//! This crate provides:
//! - [`html`] — permissive HTML extraction (links, meta, images, JSON-LD, headings)
//! - [`feed`] — RSS 2.0 / Atom detection and item mapping
//! - [`sitemap`] — urlset + sitemapindex parsing
//!
//! All parsers are pure: bytes in, records out, no I/O.

pub mod feed;
pub mod html;
pub mod sitemap;

pub use feed::parse_feed;
pub use html::{HtmlExtraction, extract_html};
pub use sitemap::parse_sitemap;
