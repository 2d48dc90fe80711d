//! Sitemap XML parsing: `<urlset>` documents and `<sitemapindex>`
//! indexes. The sitemaps.org namespace is recognized but not required —
//! matching is on local element names.

use roxmltree::{Document, Node};
use url::Url;

use webharvest_shared::{SitemapEntry, SitemapRecord};

/// Priority used when the element is absent or unparseable.
const DEFAULT_PRIORITY: f64 = 0.5;

/// Parse a fetched sitemap body into a [`SitemapRecord`].
pub fn parse_sitemap(xml: &str, url: &Url) -> SitemapRecord {
    let doc = match Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => return SitemapRecord::failed(url.as_str(), format!("invalid XML: {e}")),
    };

    let root = doc.root_element();
    match root.tag_name().name() {
        "sitemapindex" => SitemapRecord {
            url: url.to_string(),
            urls: Vec::new(),
            nested_sitemaps: root
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "sitemap")
                .filter_map(|n| child_text(n, "loc"))
                .collect(),
            error: None,
        },
        "urlset" => SitemapRecord {
            url: url.to_string(),
            urls: root
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "url")
                .filter_map(parse_entry)
                .collect(),
            nested_sitemaps: Vec::new(),
            error: None,
        },
        other => SitemapRecord::failed(
            url.as_str(),
            format!("unrecognized sitemap root element <{other}>"),
        ),
    }
}

/// One `<url>` block. Entries without a `<loc>` are skipped.
fn parse_entry(node: Node) -> Option<SitemapEntry> {
    let loc = child_text(node, "loc")?;

    Some(SitemapEntry {
        loc,
        lastmod: child_text(node, "lastmod"),
        changefreq: child_text(node, "changefreq"),
        priority: child_text(node, "priority")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PRIORITY),
    })
}

fn child_text(node: Node, name: &str) -> Option<String> {
    let text = node
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == name)?
        .text()?
        .trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
