//! HTTP-shaped request routing for the plugin surface.
//!
//! A request is (method, path, body bytes); the body is JSON when
//! present. Each (method, path) pair maps to one engine workflow.
//! Protocol failures short-circuit: 400 for malformed JSON or a missing
//! `url`, 404 for unknown paths, 405 for wrong methods, 503 when a
//! required collaborator is missing, 500 for engine failures.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};

use webharvest_attest::Job;
use webharvest_crawler::CrawlOptions;
use webharvest_shared::HarvestError;

use crate::engine::HarvestEngine;

/// Response-body truncation caps (records themselves are untruncated).
const MAX_RESPONSE_IMAGES: usize = 20;
const MAX_RESPONSE_SITEMAP_URLS: usize = 100;
const MAX_RESPONSE_ITEM_DESCRIPTION: usize = 200;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// An HTTP request as delivered over the plugin RPC surface.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: &str, path: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }
}

/// The response handed back over the RPC surface. Body is JSON.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json<T: Serialize>(status: u16, data: &T) -> Self {
        let body = serde_json::to_vec(data).unwrap_or_default();
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, &json!({ "error": message }))
    }

    /// The body decoded as a JSON value (test and client convenience).
    pub fn body_json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

fn engine_error(err: HarvestError) -> HttpResponse {
    let status = match &err {
        HarvestError::Validation { .. } => 400,
        HarvestError::NotInitialized => 503,
        _ => 500,
    };
    HttpResponse::error(status, &err.to_string())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Route one request to its workflow.
pub async fn route(engine: &HarvestEngine, request: &HttpRequest) -> HttpResponse {
    let body: Value = if request.body.is_empty() {
        json!({})
    } else {
        match serde_json::from_slice(&request.body) {
            Ok(value) => value,
            Err(e) => return HttpResponse::error(400, &format!("invalid JSON body: {e}")),
        }
    };

    let path = request.path.as_str();
    match request.method.as_str() {
        "GET" => match path {
            "/jobs" => handle_list_jobs(engine, &body).await,
            _ => HttpResponse::error(404, &format!("unknown GET endpoint: {path}")),
        },
        "POST" => match path {
            "/scrape" => handle_scrape(engine, &body, false).await,
            "/scrape-full" => handle_scrape(engine, &body, true).await,
            "/scrape-and-attest" => handle_scrape_and_attest(engine, &body).await,
            "/feed" => handle_feed(engine, &body).await,
            "/feed-and-attest" => handle_feed_and_attest(engine, &body).await,
            "/sitemap" => handle_sitemap(engine, &body).await,
            "/sitemap-and-attest" => handle_sitemap_and_attest(engine, &body).await,
            "/crawl" => handle_crawl(engine, &body).await,
            "/schedule/scrape" | "/schedule/feed" | "/schedule/sitemap" | "/schedule/crawl" => {
                handle_schedule(engine, path, &body).await
            }
            _ => HttpResponse::error(404, &format!("unknown endpoint: {path}")),
        },
        _ => HttpResponse::error(405, "method not allowed"),
    }
}

// ---------------------------------------------------------------------------
// Body field helpers
// ---------------------------------------------------------------------------

fn require_url(body: &Value) -> Result<String, Box<HttpResponse>> {
    match body.get("url").and_then(Value::as_str) {
        Some(url) if !url.is_empty() => Ok(url.to_string()),
        _ => Err(Box::new(HttpResponse::error(400, "missing 'url' field"))),
    }
}

fn str_field<'a>(body: &'a Value, key: &str) -> &'a str {
    body.get(key).and_then(Value::as_str).unwrap_or("")
}

fn bool_field(body: &Value, key: &str, default: bool) -> bool {
    body.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn usize_field(body: &Value, key: &str, default: usize) -> usize {
    body.get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_scrape(engine: &HarvestEngine, body: &Value, full: bool) -> HttpResponse {
    let url = match require_url(body) {
        Ok(url) => url,
        Err(response) => return *response,
    };

    let mut record = engine.scrape(&url, full).await;
    record.images.truncate(MAX_RESPONSE_IMAGES);
    HttpResponse::json(200, &record)
}

async fn handle_scrape_and_attest(engine: &HarvestEngine, body: &Value) -> HttpResponse {
    let url = match require_url(body) {
        Ok(url) => url,
        Err(response) => return *response,
    };
    let actor = str_field(body, "actor");
    let include_external = bool_field(body, "include_external", true);

    match engine.scrape_and_attest(&url, actor, include_external).await {
        Ok((record, ids)) => HttpResponse::json(
            200,
            &json!({
                "url": record.url,
                "title": record.title,
                "status_code": record.status_code,
                "error": record.error,
                "links_count": record.links.len(),
                "images_count": record.images.len(),
                "structured_data_count": record.structured_data.len(),
                "attestations_created": ids.len(),
                "attestation_ids": ids,
            }),
        ),
        Err(e) => engine_error(e),
    }
}

async fn handle_feed(engine: &HarvestEngine, body: &Value) -> HttpResponse {
    let url = match require_url(body) {
        Ok(url) => url,
        Err(response) => return *response,
    };

    let mut record = engine.feed(&url).await;
    for item in &mut record.items {
        if let Some(description) = &item.description {
            if description.chars().count() > MAX_RESPONSE_ITEM_DESCRIPTION {
                item.description =
                    Some(truncate_chars(description, MAX_RESPONSE_ITEM_DESCRIPTION));
            }
        }
    }
    HttpResponse::json(200, &record)
}

async fn handle_feed_and_attest(engine: &HarvestEngine, body: &Value) -> HttpResponse {
    let url = match require_url(body) {
        Ok(url) => url,
        Err(response) => return *response,
    };
    let actor = str_field(body, "actor");

    match engine.feed_and_attest(&url, actor).await {
        Ok((record, ids)) => HttpResponse::json(
            200,
            &json!({
                "url": record.url,
                "title": record.title,
                "feed_type": record.feed_type,
                "error": record.error,
                "items_count": record.items.len(),
                "attestations_created": ids.len(),
                "attestation_ids": ids,
            }),
        ),
        Err(e) => engine_error(e),
    }
}

async fn handle_sitemap(engine: &HarvestEngine, body: &Value) -> HttpResponse {
    let url = match require_url(body) {
        Ok(url) => url,
        Err(response) => return *response,
    };

    let record = engine.sitemap(&url).await;
    let urls: Vec<_> = record.urls.iter().take(MAX_RESPONSE_SITEMAP_URLS).collect();
    HttpResponse::json(
        200,
        &json!({
            "url": record.url,
            "error": record.error,
            "urls_count": record.urls.len(),
            "nested_sitemaps": record.nested_sitemaps,
            "urls": urls,
        }),
    )
}

async fn handle_sitemap_and_attest(engine: &HarvestEngine, body: &Value) -> HttpResponse {
    let url = match require_url(body) {
        Ok(url) => url,
        Err(response) => return *response,
    };
    let actor = str_field(body, "actor");
    let follow_nested = bool_field(body, "follow_nested", true);
    let max_nested = usize_field(body, "max_nested", 10);

    match engine
        .sitemap_and_attest(&url, actor, follow_nested, max_nested)
        .await
    {
        Ok((records, ids)) => {
            let total_urls: usize = records.iter().map(|r| r.urls.len()).sum();
            let sitemaps: Vec<_> = records
                .iter()
                .map(|r| {
                    json!({
                        "url": r.url,
                        "urls_count": r.urls.len(),
                        "nested_count": r.nested_sitemaps.len(),
                        "error": r.error,
                    })
                })
                .collect();
            HttpResponse::json(
                200,
                &json!({
                    "start_url": url,
                    "sitemaps_processed": records.len(),
                    "total_urls": total_urls,
                    "attestations_created": ids.len(),
                    "sitemaps": sitemaps,
                }),
            )
        }
        Err(e) => engine_error(e),
    }
}

async fn handle_crawl(engine: &HarvestEngine, body: &Value) -> HttpResponse {
    let url = match require_url(body) {
        Ok(url) => url,
        Err(response) => return *response,
    };
    let actor = str_field(body, "actor");
    let options = CrawlOptions {
        max_pages: usize_field(body, "max_pages", 10),
        same_origin_only: bool_field(body, "same_domain_only", true),
        skip_attested: bool_field(body, "skip_previously_attested", false),
    };

    match engine.crawl_and_attest(&url, actor, &options).await {
        Ok((pages, ids)) => {
            let total_links: usize = pages.iter().map(|p| p.links.len()).sum();
            let page_summaries: Vec<_> = pages
                .iter()
                .map(|p| {
                    json!({
                        "url": p.url,
                        "title": p.title,
                        "links_count": p.links.len(),
                        "error": p.error,
                    })
                })
                .collect();
            HttpResponse::json(
                200,
                &json!({
                    "start_url": url,
                    "pages_crawled": pages.len(),
                    "total_links": total_links,
                    "attestations_created": ids.len(),
                    "pages": page_summaries,
                }),
            )
        }
        Err(e) => engine_error(e),
    }
}

async fn handle_schedule(engine: &HarvestEngine, path: &str, body: &Value) -> HttpResponse {
    if !engine.has_queue() {
        return HttpResponse::error(503, "job queue not configured");
    }
    let url = match require_url(body) {
        Ok(url) => url,
        Err(response) => return *response,
    };
    let actor = str_field(body, "actor");

    let job = match path {
        "/schedule/scrape" => Job::scrape(&url, actor, bool_field(body, "extract_all", true)),
        "/schedule/feed" => Job::scrape_feed(&url, actor),
        "/schedule/sitemap" => {
            Job::scrape_sitemap(&url, actor, bool_field(body, "follow_nested", true))
        }
        "/schedule/crawl" => Job::crawl(
            &url,
            actor,
            usize_field(body, "max_pages", 10),
            bool_field(body, "same_domain_only", true),
        ),
        _ => return HttpResponse::error(404, &format!("unknown endpoint: {path}")),
    };

    match engine.schedule(&job).await {
        Ok(job_id) => HttpResponse::json(200, &json!({ "job_id": job_id, "status": "queued" })),
        Err(e) => engine_error(e),
    }
}

async fn handle_list_jobs(engine: &HarvestEngine, body: &Value) -> HttpResponse {
    if !engine.has_queue() {
        return HttpResponse::error(503, "job queue not configured");
    }
    let status = body.get("status").and_then(Value::as_str).filter(|s| !s.is_empty());
    let limit = usize_field(body, "limit", 100) as u32;

    match engine.list_jobs(status, limit).await {
        Ok(jobs) => {
            let jobs: Vec<_> = jobs
                .iter()
                .map(|j| {
                    json!({
                        "id": j.id,
                        "handler": j.handler_name,
                        "status": j.status,
                        "progress": { "current": j.progress.current, "total": j.progress.total },
                        "error": j.error,
                        "created_at": j.created_at,
                    })
                })
                .collect();
            HttpResponse::json(200, &json!({ "jobs": jobs }))
        }
        Err(e) => engine_error(e),
    }
}
