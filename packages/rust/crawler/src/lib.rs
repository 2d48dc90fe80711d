//! Page pipeline and bounded breadth-first crawler.
//!
//! [`harvest_page`] runs one URL through the polite-fetch + HTML-extract
//! pipeline, capturing failures into the record instead of propagating
//! them. [`Crawler`] runs that pipeline breadth-first from a start URL:
//! FIFO frontier, visited-set dedup, a hard page budget, an optional
//! same-origin filter, and an optional skip of URLs the sink already
//! holds a `has_title` attestation for.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use webharvest_attest::{AttestationFilter, AttestationSink, predicates};
use webharvest_extract::extract_html;
use webharvest_fetch::PoliteFetcher;
use webharvest_shared::PageRecord;

/// Fetch one page and extract it into a [`PageRecord`].
///
/// Never fails: policy refusals, transport errors, and size-cap hits
/// land in `record.error` with `status_code` 0 (or the HTTP status for
/// non-2xx responses).
pub async fn harvest_page(fetcher: &PoliteFetcher, url: &Url, full: bool) -> PageRecord {
    let fetched = match fetcher.fetch(url, &["text/html"]).await {
        Ok(fetched) => fetched,
        Err(e) => {
            debug!(%url, error = %e, "page fetch failed");
            return PageRecord::failed(url.as_str(), e.status_code(), e.to_string());
        }
    };

    let body = fetched.text();
    let extraction = extract_html(&body, url, full);

    PageRecord {
        url: url.to_string(),
        title: extraction.title,
        status_code: fetched.status,
        links: extraction.links,
        meta: extraction.meta,
        images: extraction.images,
        structured_data: extraction.structured_data,
        headings: extraction.headings,
        fetched_at: Utc::now(),
        error: None,
    }
}

/// Knobs for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Hard bound on pages visited (attested skips count too).
    pub max_pages: usize,
    /// Drop links whose host differs from the page they came from.
    pub same_origin_only: bool,
    /// Skip URLs that already carry a `has_title` attestation in the
    /// sink. Costs one sink query per frontier URL.
    pub skip_attested: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: 10,
            same_origin_only: true,
            skip_attested: false,
        }
    }
}

/// Breadth-first crawler over the shared polite fetcher.
pub struct Crawler {
    fetcher: Arc<PoliteFetcher>,
}

impl Crawler {
    pub fn new(fetcher: Arc<PoliteFetcher>) -> Self {
        Self { fetcher }
    }

    /// Crawl from `start_url` and return the visited pages in visit
    /// order: breadth-first, FIFO within a level, ties broken by
    /// document order of the discovering page's links.
    ///
    /// Per-page failures do not abort the run — the failed page's
    /// record carries the error and the crawl advances.
    #[instrument(skip_all, fields(start_url = %start_url, max_pages = options.max_pages))]
    pub async fn crawl(
        &self,
        start_url: &Url,
        options: &CrawlOptions,
        sink: Option<&dyn AttestationSink>,
    ) -> Vec<PageRecord> {
        let mut visited: HashSet<String> = HashSet::new();
        // Everything ever enqueued, so one URL enters the frontier once.
        let mut queued: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<Url> = VecDeque::new();
        let mut pages: Vec<PageRecord> = Vec::new();

        queued.insert(start_url.to_string());
        frontier.push_back(start_url.clone());

        while visited.len() < options.max_pages {
            let Some(url) = frontier.pop_front() else { break };
            let key = url.to_string();
            if visited.contains(&key) {
                continue;
            }

            if options.skip_attested {
                if let Some(sink) = sink {
                    if already_attested(sink, &key).await {
                        debug!(url = %key, "already attested, skipping");
                        visited.insert(key);
                        continue;
                    }
                }
            }

            visited.insert(key);
            let record = harvest_page(&self.fetcher, &url, true).await;

            if record.error.is_none() {
                for link in &record.links {
                    if queued.contains(&link.target_url) {
                        continue;
                    }
                    if options.same_origin_only && link.is_external {
                        continue;
                    }
                    let Ok(target) = Url::parse(&link.target_url) else {
                        continue;
                    };
                    queued.insert(link.target_url.clone());
                    frontier.push_back(target);
                }
            }

            pages.push(record);
        }

        info!(
            pages = pages.len(),
            frontier_left = frontier.len(),
            "crawl complete"
        );
        pages
    }
}

/// Whether the sink already holds a `has_title` attestation for a URL.
/// Probe failures are logged and treated as "not attested" — a flaky
/// sink should not stall the crawl.
async fn already_attested(sink: &dyn AttestationSink, url: &str) -> bool {
    let filter = AttestationFilter::subject_predicate(url, predicates::HAS_TITLE);
    match sink.query(&filter).await {
        Ok(found) => !found.is_empty(),
        Err(e) => {
            warn!(url, error = %e, "attestation probe failed, treating as new");
            false
        }
    }
}
