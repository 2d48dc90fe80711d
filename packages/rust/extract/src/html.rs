//! HTML extraction: links, title, meta, Open Graph, Twitter cards,
//! canonical URL, images, JSON-LD structured data, and headings.
//!
//! The parse is permissive — real-world markup is messy and `scraper`
//! tolerates it. Basic extraction covers title and links; full
//! extraction adds everything else.

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use url::Url;

use webharvest_shared::{ExtractedLink, ImageRecord, MetaRecord, StructuredDatum};

/// Everything pulled out of one HTML document.
#[derive(Debug, Clone, Default)]
pub struct HtmlExtraction {
    pub title: String,
    pub links: Vec<ExtractedLink>,
    pub meta: Option<MetaRecord>,
    pub images: Vec<ImageRecord>,
    pub structured_data: Vec<StructuredDatum>,
    pub headings: BTreeMap<String, Vec<String>>,
}

/// Extract a page. `full` enables meta/images/structured-data/headings
/// on top of the basic title + links pass.
pub fn extract_html(html: &str, base: &Url, full: bool) -> HtmlExtraction {
    let document = Html::parse_document(html);

    let title = selector("title")
        .and_then(|s| document.select(&s).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let links = extract_links(&document, base);

    if !full {
        return HtmlExtraction {
            title,
            links,
            ..Default::default()
        };
    }

    HtmlExtraction {
        title,
        links,
        meta: Some(extract_meta(&document, base)),
        images: extract_images(&document, base),
        structured_data: extract_structured_data(&document),
        headings: extract_headings(&document),
    }
}

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

fn extract_links(document: &Html, base: &Url) -> Vec<ExtractedLink> {
    let Some(sel) = selector("a[href]") else {
        return vec![];
    };
    let base_host = base.host_str();

    document
        .select(&sel)
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            let resolved = base.join(href).ok()?;

            // Only http(s) targets survive (drops mailto:, javascript:, …).
            if resolved.scheme() != "http" && resolved.scheme() != "https" {
                return None;
            }

            let rel = el
                .value()
                .attr("rel")
                .map(|r| r.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();

            Some(ExtractedLink {
                source_url: base.to_string(),
                target_url: resolved.to_string(),
                anchor_text: el.text().collect::<String>().trim().to_string(),
                rel,
                is_external: resolved.host_str() != base_host,
            })
        })
        .collect()
}

fn extract_meta(document: &Html, base: &Url) -> MetaRecord {
    let mut meta = MetaRecord {
        description: meta_by_name(document, "description"),
        keywords: meta_by_name(document, "keywords")
            .map(|k| {
                k.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        author: meta_by_name(document, "author"),
        ..Default::default()
    };

    // First present wins, in this order.
    meta.published_date = meta_by_property(document, "article:published_time")
        .or_else(|| meta_by_property(document, "datePublished"))
        .or_else(|| meta_by_name(document, "date"));
    meta.modified_date = meta_by_property(document, "article:modified_time")
        .or_else(|| meta_by_property(document, "dateModified"));

    meta.og_title = meta_by_property(document, "og:title");
    meta.og_description = meta_by_property(document, "og:description");
    meta.og_image = meta_by_property(document, "og:image");
    meta.og_type = meta_by_property(document, "og:type");
    meta.og_url = meta_by_property(document, "og:url");

    meta.twitter_card = meta_by_name(document, "twitter:card");
    meta.twitter_title = meta_by_name(document, "twitter:title");
    meta.twitter_description = meta_by_name(document, "twitter:description");
    meta.twitter_image = meta_by_name(document, "twitter:image");

    meta.canonical_url = selector("link[rel='canonical']")
        .and_then(|s| document.select(&s).next())
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| base.join(href).ok())
        .map(|u| u.to_string());

    meta.language = selector("html")
        .and_then(|s| document.select(&s).next())
        .and_then(|el| el.value().attr("lang").map(str::to_string));

    meta
}

fn meta_by_name(document: &Html, name: &str) -> Option<String> {
    meta_content(document, &format!("meta[name='{name}']"))
}

fn meta_by_property(document: &Html, property: &str) -> Option<String> {
    meta_content(document, &format!("meta[property='{property}']"))
}

fn meta_content(document: &Html, sel: &str) -> Option<String> {
    selector(sel)
        .and_then(|s| document.select(&s).next())
        .and_then(|el| el.value().attr("content").map(str::to_string))
}

fn extract_images(document: &Html, base: &Url) -> Vec<ImageRecord> {
    let Some(sel) = selector("img[src]") else {
        return vec![];
    };

    document
        .select(&sel)
        .filter_map(|el| {
            let src = el.value().attr("src")?;
            let resolved = base.join(src).ok()?;

            Some(ImageRecord {
                src: resolved.to_string(),
                alt: el.value().attr("alt").map(str::to_string),
                title: el.value().attr("title").map(str::to_string),
                // Dimensions only when fully numeric ("100px" is noise).
                width: el.value().attr("width").and_then(|w| w.parse().ok()),
                height: el.value().attr("height").and_then(|h| h.parse().ok()),
            })
        })
        .collect()
}

fn extract_structured_data(document: &Html) -> Vec<StructuredDatum> {
    let Some(sel) = selector("script[type='application/ld+json']") else {
        return vec![];
    };

    let mut data = Vec::new();
    for el in document.select(&sel) {
        let raw = el.text().collect::<String>();
        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            // Invalid JSON-LD is skipped, not surfaced.
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable JSON-LD block");
                continue;
            }
        };

        match &value {
            serde_json::Value::Object(obj) => {
                if let Some(serde_json::Value::Array(graph)) = obj.get("@graph") {
                    data.extend(graph.iter().filter_map(datum_from));
                } else if let Some(datum) = datum_from(&value) {
                    data.push(datum);
                }
            }
            serde_json::Value::Array(items) => {
                data.extend(items.iter().filter_map(datum_from));
            }
            _ => {}
        }
    }
    data
}

/// One datum per object carrying an `@type` (first entry when the type
/// itself is a list).
fn datum_from(value: &serde_json::Value) -> Option<StructuredDatum> {
    let type_value = value.as_object()?.get("@type")?;
    let datum_type = match type_value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.first()?.as_str()?.to_string(),
        _ => return None,
    };

    Some(StructuredDatum {
        datum_type,
        data: value.clone(),
    })
}

fn extract_headings(document: &Html) -> BTreeMap<String, Vec<String>> {
    let mut headings = BTreeMap::new();
    for level in 1..=6 {
        let tag = format!("h{level}");
        let texts: Vec<String> = selector(&tag)
            .map(|s| {
                document
                    .select(&s)
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if !texts.is_empty() {
            headings.insert(tag, texts);
        }
    }
    headings
}
