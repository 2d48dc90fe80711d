//! Size-capped HTTP fetcher.
//!
//! One `reqwest::Client` per engine: the client keeps its own per-origin
//! connection pool, so all workflows share connections. The body is read
//! as a stream and the read aborts the moment the accumulated length
//! would exceed the configured cap, regardless of what Content-Length
//! claimed.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use webharvest_shared::{HarvestError, Result};

/// A fetched response body, bounded by the configured size cap.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    /// Raw Content-Type header value, if the server sent one.
    pub content_type: Option<String>,
    /// URL after any redirects the client followed.
    pub final_url: Url,
    pub status: u16,
}

impl FetchedBody {
    /// The body decoded as text (lossy — harvested markup is parsed
    /// leniently anyway).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// HTTP fetcher with a shared connection pool and a hard response cap.
pub struct Fetcher {
    client: reqwest::Client,
    max_response_size: usize,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Duration, max_response_size: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_response_size,
        })
    }

    /// GET a URL and return at most `max_response_size` body bytes.
    ///
    /// `expected_types` is advisory: a Content-Type that matches none of
    /// the given substrings is logged but the body is still returned.
    pub async fn fetch(&self, url: &Url, expected_types: &[&str]) -> Result<FetchedBody> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| HarvestError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // Refuse up front when the server admits the body is too big.
        if let Some(len) = response.content_length() {
            if len > self.max_response_size as u64 {
                return Err(HarvestError::TooLarge {
                    limit: self.max_response_size,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !expected_types.is_empty() {
            if let Some(ct) = &content_type {
                if !expected_types.iter().any(|t| ct.contains(t)) {
                    tracing::warn!(%url, content_type = %ct, expected = ?expected_types,
                        "unexpected content type");
                }
            }
        }

        let final_url = response.url().clone();
        let status = status.as_u16();

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| HarvestError::Network(format!("{url}: body read: {e}")))?;
            if bytes.len() + chunk.len() > self.max_response_size {
                return Err(HarvestError::TooLarge {
                    limit: self.max_response_size,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedBody {
            bytes,
            content_type,
            final_url,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(cap: usize) -> Fetcher {
        Fetcher::new("Harvester/0.2", Duration::from_secs(5), cap).expect("build fetcher")
    }

    #[tokio::test]
    async fn fetches_small_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html></html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let body = fetcher(1024).fetch(&url, &["text/html"]).await.unwrap();

        assert_eq!(body.status, 200);
        assert_eq!(body.text(), "<html></html>");
        assert!(body.content_type.unwrap().contains("text/html"));
    }

    #[tokio::test]
    async fn refuses_oversized_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/large"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 200]))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/large", server.uri())).unwrap();
        let err = fetcher(100).fetch(&url, &[]).await.unwrap_err();
        assert!(matches!(err, HarvestError::TooLarge { limit: 100 }));
    }

    #[tokio::test]
    async fn refuses_on_content_length_header() {
        // Advertised length alone should refuse the fetch, even before
        // reading any body.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/huge"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 5000]))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/huge", server.uri())).unwrap();
        let err = fetcher(1000).fetch(&url, &[]).await.unwrap_err();
        assert!(matches!(err, HarvestError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn streaming_read_aborts_at_cap_without_content_length() {
        // A chunked response carries no Content-Length, so the cap can
        // only hold if the streaming read itself aborts.
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      Content-Type: text/html\r\n\
                      Transfer-Encoding: chunked\r\n\
                      Connection: close\r\n\r\n",
                )
                .await;
            // 8 chunks of 1 KiB against a 2 KiB cap; the client hangs
            // up early, so write errors are expected.
            let chunk = [b'x'; 1024];
            for _ in 0..8 {
                if socket.write_all(b"400\r\n").await.is_err() {
                    return;
                }
                if socket.write_all(&chunk).await.is_err() {
                    return;
                }
                if socket.write_all(b"\r\n").await.is_err() {
                    return;
                }
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });

        let url = Url::parse(&format!("http://{addr}/stream")).unwrap();
        let err = fetcher(2048).fetch(&url, &[]).await.unwrap_err();
        assert!(matches!(err, HarvestError::TooLarge { limit: 2048 }));
    }

    #[tokio::test]
    async fn non_2xx_is_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = fetcher(1024).fetch(&url, &[]).await.unwrap_err();
        match err {
            HarvestError::Http { status, .. } => assert_eq!(status, 404),
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn content_type_mismatch_is_advisory() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{\"test\": 1}")
                    .insert_header("Content-Type", "application/json"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/json", server.uri())).unwrap();
        // Expecting text/html, getting JSON: logged, not fatal.
        let body = fetcher(1024).fetch(&url, &["text/html"]).await.unwrap();
        assert_eq!(body.text(), "{\"test\": 1}");
    }
}
