//! Harvest engine, request router, and the plugin service surface.
//!
//! This crate ties the member crates together:
//! - [`engine`] — workflows (scrape / feed / sitemap / crawl, each ± attest)
//! - [`router`] — (method, path, JSON body) → workflow dispatch
//! - [`plugin`] — Metadata / Initialize / Shutdown / HandleHTTP / Health

pub mod engine;
pub mod plugin;
pub mod router;

pub use engine::HarvestEngine;
pub use plugin::{HarvesterPlugin, HealthStatus, InitializeOptions, PluginMetadata};
pub use router::{HttpRequest, HttpResponse};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Initialize options for talking to local mock servers.
    fn local_options(sink_endpoint: &str, queue_endpoint: &str) -> InitializeOptions {
        let mut config = std::collections::HashMap::new();
        config.insert("allow_private_ips".to_string(), "true".to_string());
        config.insert("respect_robots".to_string(), "false".to_string());
        config.insert("rate_limit".to_string(), "0".to_string());

        InitializeOptions {
            sink_endpoint: sink_endpoint.to_string(),
            queue_endpoint: queue_endpoint.to_string(),
            auth_token: "test-token".to_string(),
            config,
        }
    }

    async fn initialized_plugin(sink: &str, queue: &str) -> HarvesterPlugin {
        let plugin = HarvesterPlugin::new();
        plugin
            .initialize(local_options(sink, queue))
            .await
            .expect("initialize plugin");
        plugin
    }

    fn post(path: &str, body: serde_json::Value) -> HttpRequest {
        HttpRequest::new("POST", path, serde_json::to_vec(&body).unwrap())
    }

    async fn mount_body(server: &MockServer, at: &str, content_type: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("Content-Type", content_type),
            )
            .mount(server)
            .await;
    }

    /// Sink mock accepting every generate call.
    async fn mount_sink(server: &MockServer, expected_creates: u64) {
        Mock::given(method("POST"))
            .and(path("/attestations/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "attestation": {"id": "at-1"}
            })))
            .expect(expected_creates)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/attestations/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "attestations": []
            })))
            .mount(server)
            .await;
    }

    // -----------------------------------------------------------------------
    // Plugin surface
    // -----------------------------------------------------------------------

    #[test]
    fn metadata_reports_identity() {
        let metadata = HarvesterPlugin::new().metadata();
        assert_eq!(metadata.name, "webharvest");
        assert_eq!(metadata.license, "MIT");
        assert!(!metadata.version.is_empty());
    }

    #[tokio::test]
    async fn uninitialized_plugin_returns_503() {
        let plugin = HarvesterPlugin::new();
        let response = plugin
            .handle_http(&post("/scrape", json!({"url": "http://example.com/"})))
            .await;
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn shutdown_drops_the_engine() {
        let plugin = initialized_plugin("", "").await;
        assert!(plugin.health().await.healthy);

        plugin.shutdown().await;
        assert!(!plugin.health().await.healthy);
        let response = plugin
            .handle_http(&post("/scrape", json!({"url": "http://example.com/"})))
            .await;
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn health_reports_collaborators() {
        let plugin = initialized_plugin("http://127.0.0.1:1/sink", "").await;
        let health = plugin.health().await;
        assert!(health.healthy);
        assert_eq!(health.details["sink"], "connected");
        assert_eq!(health.details["queue"], "not configured");
        assert_eq!(health.details["respect_robots"], "false");
    }

    #[tokio::test]
    async fn invalid_config_fails_initialize() {
        let plugin = HarvesterPlugin::new();
        let mut options = local_options("", "");
        options
            .config
            .insert("timeout".to_string(), "not-a-number".to_string());
        assert!(plugin.initialize(options).await.is_err());
    }

    // -----------------------------------------------------------------------
    // Router protocol errors
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unknown_path_is_404() {
        let plugin = initialized_plugin("", "").await;
        let response = plugin.handle_http(&post("/nope", json!({}))).await;
        assert_eq!(response.status, 404);

        let response = plugin
            .handle_http(&HttpRequest::new("GET", "/nope", Vec::new()))
            .await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let plugin = initialized_plugin("", "").await;
        let response = plugin
            .handle_http(&HttpRequest::new("DELETE", "/scrape", Vec::new()))
            .await;
        assert_eq!(response.status, 405);
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let plugin = initialized_plugin("", "").await;
        let response = plugin
            .handle_http(&HttpRequest::new("POST", "/scrape", b"{not json".to_vec()))
            .await;
        assert_eq!(response.status, 400);
        assert!(
            response.body_json()["error"]
                .as_str()
                .unwrap()
                .contains("invalid JSON")
        );
    }

    #[tokio::test]
    async fn missing_url_is_400() {
        let plugin = initialized_plugin("", "").await;
        for endpoint in ["/scrape", "/feed", "/sitemap", "/crawl"] {
            let response = plugin.handle_http(&post(endpoint, json!({}))).await;
            assert_eq!(response.status, 400, "{endpoint}");
        }
    }

    #[tokio::test]
    async fn attest_without_sink_is_500() {
        let plugin = initialized_plugin("", "").await;
        let response = plugin
            .handle_http(&post(
                "/scrape-and-attest",
                json!({"url": "http://example.com/"}),
            ))
            .await;
        assert_eq!(response.status, 500);
        assert!(
            response.body_json()["error"]
                .as_str()
                .unwrap()
                .contains("sink")
        );
    }

    #[tokio::test]
    async fn schedule_without_queue_is_503() {
        let plugin = initialized_plugin("", "").await;
        for endpoint in [
            "/schedule/scrape",
            "/schedule/feed",
            "/schedule/sitemap",
            "/schedule/crawl",
        ] {
            let response = plugin
                .handle_http(&post(endpoint, json!({"url": "http://example.com/"})))
                .await;
            assert_eq!(response.status, 503, "{endpoint}");
        }

        let response = plugin
            .handle_http(&HttpRequest::new("GET", "/jobs", Vec::new()))
            .await;
        assert_eq!(response.status, 503);
    }

    // -----------------------------------------------------------------------
    // Workflows end to end
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn scrape_roundtrip() {
        let web = MockServer::start().await;
        mount_body(
            &web,
            "/p",
            "text/html",
            r#"<html lang="en"><head><title>T</title></head>
               <body><a href="/a" rel="nofollow">x</a></body></html>"#,
        )
        .await;

        let plugin = initialized_plugin("", "").await;
        let url = format!("{}/p", web.uri());
        let response = plugin.handle_http(&post("/scrape", json!({"url": url}))).await;

        assert_eq!(response.status, 200);
        let body = response.body_json();
        assert_eq!(body["title"], "T");
        assert_eq!(body["status_code"], 200);
        assert_eq!(body["links"][0]["target_url"], format!("{}/a", web.uri()));
        assert_eq!(body["links"][0]["rel"][0], "nofollow");
        // Basic scrape: no extended extraction.
        assert!(body.get("meta").is_none());
    }

    #[tokio::test]
    async fn scrape_full_includes_extended_fields() {
        let web = MockServer::start().await;
        mount_body(
            &web,
            "/p",
            "text/html",
            r#"<html lang="en"><head><title>T</title>
               <meta name="description" content="D"></head>
               <body><h1>Main</h1><img src="/i.jpg" alt="pic"></body></html>"#,
        )
        .await;

        let plugin = initialized_plugin("", "").await;
        let url = format!("{}/p", web.uri());
        let response = plugin
            .handle_http(&post("/scrape-full", json!({"url": url})))
            .await;

        let body = response.body_json();
        assert_eq!(body["meta"]["description"], "D");
        assert_eq!(body["meta"]["language"], "en");
        assert_eq!(body["headings"]["h1"][0], "Main");
        assert_eq!(body["images"][0]["alt"], "pic");
    }

    #[tokio::test]
    async fn fetch_failure_is_captured_in_record() {
        let plugin = initialized_plugin("", "").await;
        // Nothing listens here; the record carries the transport error.
        let response = plugin
            .handle_http(&post(
                "/scrape",
                json!({"url": "http://127.0.0.1:9/down"}),
            ))
            .await;

        assert_eq!(response.status, 200);
        let body = response.body_json();
        assert_eq!(body["status_code"], 0);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn scrape_and_attest_creates_attestations() {
        let web = MockServer::start().await;
        mount_body(
            &web,
            "/p",
            "text/html",
            r#"<html><head><title>T</title></head>
               <body><a href="/a">x</a></body></html>"#,
        )
        .await;

        let sink = MockServer::start().await;
        // One has_title + one links_to.
        mount_sink(&sink, 2).await;

        let plugin = initialized_plugin(&sink.uri(), "").await;
        let url = format!("{}/p", web.uri());
        let response = plugin
            .handle_http(&post("/scrape-and-attest", json!({"url": url, "actor": "a-1"})))
            .await;

        assert_eq!(response.status, 200);
        let body = response.body_json();
        assert_eq!(body["attestations_created"], 2);
        assert_eq!(body["links_count"], 1);
    }

    #[tokio::test]
    async fn feed_roundtrip() {
        let web = MockServer::start().await;
        mount_body(
            &web,
            "/feed.xml",
            "application/rss+xml",
            r#"<rss version="2.0"><channel>
                 <title>F</title>
                 <item><title>I1</title><link>http://example.com/i1</link></item>
               </channel></rss>"#,
        )
        .await;

        let plugin = initialized_plugin("", "").await;
        let url = format!("{}/feed.xml", web.uri());
        let response = plugin.handle_http(&post("/feed", json!({"url": url}))).await;

        let body = response.body_json();
        assert_eq!(body["feed_type"], "rss");
        assert_eq!(body["title"], "F");
        assert_eq!(body["items"][0]["link"], "http://example.com/i1");
    }

    #[tokio::test]
    async fn feed_and_attest_emits_title_then_items() {
        let web = MockServer::start().await;
        mount_body(
            &web,
            "/feed.xml",
            "application/rss+xml",
            r#"<rss version="2.0"><channel>
                 <title>F</title>
                 <item><title>I1</title><link>http://example.com/i1</link></item>
                 <item><title>I2</title><link>http://example.com/i2</link></item>
               </channel></rss>"#,
        )
        .await;

        let sink = MockServer::start().await;
        mount_sink(&sink, 3).await;

        let plugin = initialized_plugin(&sink.uri(), "").await;
        let url = format!("{}/feed.xml", web.uri());
        let response = plugin
            .handle_http(&post("/feed-and-attest", json!({"url": url})))
            .await;

        let body = response.body_json();
        assert_eq!(body["items_count"], 2);
        assert_eq!(body["attestations_created"], 3);
    }

    #[tokio::test]
    async fn sitemap_index_follow_with_bogus_priority() {
        let web = MockServer::start().await;
        mount_body(
            &web,
            "/sitemap.xml",
            "application/xml",
            &format!(
                r#"<sitemapindex>
                     <sitemap><loc>{0}/a.xml</loc></sitemap>
                     <sitemap><loc>{0}/b.xml</loc></sitemap>
                   </sitemapindex>"#,
                web.uri()
            ),
        )
        .await;
        mount_body(
            &web,
            "/a.xml",
            "application/xml",
            r#"<urlset><url><loc>http://h/p1</loc><priority>0.9</priority></url></urlset>"#,
        )
        .await;
        mount_body(
            &web,
            "/b.xml",
            "application/xml",
            r#"<urlset><url><loc>http://h/p2</loc><priority>bogus</priority></url></urlset>"#,
        )
        .await;

        let sink = MockServer::start().await;
        // The bogus priority must arrive at the sink as the 0.5 default.
        Mock::given(method("POST"))
            .and(path("/attestations/generate"))
            .and(body_partial_json(json!({
                "command": {"contexts": ["http://h/p2"], "attributes": {"priority": "0.5"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "attestation": {"id": "at-p2"}
            })))
            .expect(1)
            .mount(&sink)
            .await;
        Mock::given(method("POST"))
            .and(path("/attestations/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "attestation": {"id": "at-p1"}
            })))
            .expect(1)
            .mount(&sink)
            .await;

        let plugin = initialized_plugin(&sink.uri(), "").await;
        let url = format!("{}/sitemap.xml", web.uri());
        let response = plugin
            .handle_http(&post(
                "/sitemap-and-attest",
                json!({"url": url, "follow_nested": true, "max_nested": 10}),
            ))
            .await;

        assert_eq!(response.status, 200);
        let body = response.body_json();
        assert_eq!(body["sitemaps_processed"], 3);
        assert_eq!(body["total_urls"], 2);
        assert_eq!(body["attestations_created"], 2);
    }

    #[tokio::test]
    async fn sitemap_nested_budget_is_honored() {
        let web = MockServer::start().await;
        mount_body(
            &web,
            "/sitemap.xml",
            "application/xml",
            &format!(
                r#"<sitemapindex>
                     <sitemap><loc>{0}/a.xml</loc></sitemap>
                     <sitemap><loc>{0}/b.xml</loc></sitemap>
                   </sitemapindex>"#,
                web.uri()
            ),
        )
        .await;
        mount_body(
            &web,
            "/a.xml",
            "application/xml",
            r#"<urlset><url><loc>http://h/p1</loc></url></urlset>"#,
        )
        .await;

        let sink = MockServer::start().await;
        mount_sink(&sink, 1).await;

        let plugin = initialized_plugin(&sink.uri(), "").await;
        let url = format!("{}/sitemap.xml", web.uri());
        let response = plugin
            .handle_http(&post(
                "/sitemap-and-attest",
                json!({"url": url, "max_nested": 1}),
            ))
            .await;

        let body = response.body_json();
        // Root + one nested; /b.xml stays unfetched.
        assert_eq!(body["sitemaps_processed"], 2);
    }

    #[tokio::test]
    async fn crawl_attests_each_page_once() {
        let web = MockServer::start().await;
        mount_body(
            &web,
            "/root",
            "text/html",
            r#"<html><head><title>R</title></head>
               <body><a href="/leaf">go</a></body></html>"#,
        )
        .await;
        mount_body(
            &web,
            "/leaf",
            "text/html",
            r#"<html><head><title>L</title></head><body></body></html>"#,
        )
        .await;

        let sink = MockServer::start().await;
        // Root: has_title + links_to. Leaf: has_title.
        mount_sink(&sink, 3).await;

        let plugin = initialized_plugin(&sink.uri(), "").await;
        let url = format!("{}/root", web.uri());
        let response = plugin
            .handle_http(&post("/crawl", json!({"url": url, "max_pages": 5})))
            .await;

        assert_eq!(response.status, 200);
        let body = response.body_json();
        assert_eq!(body["pages_crawled"], 2);
        assert_eq!(body["attestations_created"], 3);
        assert_eq!(body["pages"][0]["title"], "R");
        assert_eq!(body["pages"][1]["title"], "L");
    }

    #[tokio::test]
    async fn schedule_crawl_enqueues_job() {
        let queue = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobs/enqueue"))
            .and(body_partial_json(json!({
                "job": {
                    "handler_name": "webharvest.crawl",
                    "payload": {"url": "http://example.com/", "max_pages": 25}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "job_id": "job-7"
            })))
            .mount(&queue)
            .await;

        let plugin = initialized_plugin("", &queue.uri()).await;
        let response = plugin
            .handle_http(&post(
                "/schedule/crawl",
                json!({"url": "http://example.com/", "max_pages": 25}),
            ))
            .await;

        assert_eq!(response.status, 200);
        let body = response.body_json();
        assert_eq!(body["job_id"], "job-7");
        assert_eq!(body["status"], "queued");
    }

    #[tokio::test]
    async fn list_jobs_roundtrip() {
        let queue = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobs/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "jobs": [{
                    "id": "job-1",
                    "handler_name": "webharvest.scrape",
                    "status": "completed",
                    "progress": {"current": 1, "total": 1}
                }]
            })))
            .mount(&queue)
            .await;

        let plugin = initialized_plugin("", &queue.uri()).await;
        let response = plugin
            .handle_http(&HttpRequest::new("GET", "/jobs", Vec::new()))
            .await;

        assert_eq!(response.status, 200);
        let body = response.body_json();
        assert_eq!(body["jobs"][0]["id"], "job-1");
        assert_eq!(body["jobs"][0]["handler"], "webharvest.scrape");
    }
}
