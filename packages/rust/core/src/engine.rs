//! The harvest engine: one struct tying the polite fetcher, parsers,
//! projector, and external clients into the workflows the router
//! dispatches to.
//!
//! Workflows are single-threaded internally; the engine itself is
//! shared across concurrent requests, so the fetcher (rate state,
//! robots cache, connection pool) and clients all sit behind `Arc`.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{info, instrument, warn};
use url::Url;

use webharvest_attest::{
    AttestationCommand, AttestationSink, Job, JobQueue, project_feed, project_page,
    project_sitemap,
};
use webharvest_crawler::{CrawlOptions, Crawler, harvest_page};
use webharvest_extract::{parse_feed, parse_sitemap};
use webharvest_fetch::PoliteFetcher;
use webharvest_shared::{
    EngineConfig, FeedRecord, HarvestError, PageRecord, Result, SitemapRecord,
};

/// Content-type hints per resource shape. Advisory only; HTML fetches
/// carry their hint inside the page pipeline.
const FEED_TYPES: &[&str] = &["xml", "rss", "atom"];
const SITEMAP_TYPES: &[&str] = &["xml"];

pub struct HarvestEngine {
    config: EngineConfig,
    fetcher: Arc<PoliteFetcher>,
    crawler: Crawler,
    sink: Option<Arc<dyn AttestationSink>>,
    queue: Option<Arc<dyn JobQueue>>,
}

impl HarvestEngine {
    pub fn new(
        config: EngineConfig,
        sink: Option<Arc<dyn AttestationSink>>,
        queue: Option<Arc<dyn JobQueue>>,
    ) -> Result<Self> {
        let fetcher = Arc::new(PoliteFetcher::new(config.clone())?);
        let crawler = Crawler::new(fetcher.clone());

        Ok(Self {
            config,
            fetcher,
            crawler,
            sink,
            queue,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub fn has_queue(&self) -> bool {
        self.queue.is_some()
    }

    fn require_sink(&self) -> Result<&dyn AttestationSink> {
        self.sink
            .as_deref()
            .ok_or_else(|| HarvestError::Sink("no attestation sink configured".into()))
    }

    fn require_queue(&self) -> Result<&dyn JobQueue> {
        self.queue
            .as_deref()
            .ok_or_else(|| HarvestError::Queue("no job queue configured".into()))
    }

    /// Send commands to the sink one by one, collecting the generated
    /// attestation IDs. The first sink failure aborts the batch.
    async fn submit(
        &self,
        sink: &dyn AttestationSink,
        commands: &[AttestationCommand],
    ) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(commands.len());
        for command in commands {
            let attestation = sink.generate_and_create(command).await?;
            ids.push(attestation.id);
        }
        Ok(ids)
    }

    // -----------------------------------------------------------------------
    // Pages
    // -----------------------------------------------------------------------

    /// Harvest one page. Failures land in the record, never in a Result.
    #[instrument(skip(self))]
    pub async fn scrape(&self, url: &str, full: bool) -> PageRecord {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return PageRecord::failed(url, 0, format!("invalid URL: {e}")),
        };
        harvest_page(&self.fetcher, &parsed, full).await
    }

    /// Full harvest plus projection into the sink. A failed fetch
    /// produces the error record and no attestations.
    #[instrument(skip(self))]
    pub async fn scrape_and_attest(
        &self,
        url: &str,
        actor: &str,
        include_external: bool,
    ) -> Result<(PageRecord, Vec<String>)> {
        let sink = self.require_sink()?;

        let record = self.scrape(url, true).await;
        if record.error.is_some() {
            return Ok((record, Vec::new()));
        }

        let commands = project_page(&record, actor, include_external);
        let ids = self.submit(sink, &commands).await?;
        info!(url, attestations = ids.len(), "page attested");
        Ok((record, ids))
    }

    // -----------------------------------------------------------------------
    // Feeds
    // -----------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn feed(&self, url: &str) -> FeedRecord {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return FeedRecord::failed(url, format!("invalid URL: {e}")),
        };
        match self.fetcher.fetch(&parsed, FEED_TYPES).await {
            Ok(fetched) => parse_feed(&fetched.text(), &parsed),
            Err(e) => FeedRecord::failed(url, e.to_string()),
        }
    }

    #[instrument(skip(self))]
    pub async fn feed_and_attest(
        &self,
        url: &str,
        actor: &str,
    ) -> Result<(FeedRecord, Vec<String>)> {
        let sink = self.require_sink()?;

        let record = self.feed(url).await;
        if record.error.is_some() {
            return Ok((record, Vec::new()));
        }

        let commands = project_feed(&record, actor);
        let ids = self.submit(sink, &commands).await?;
        info!(url, attestations = ids.len(), "feed attested");
        Ok((record, ids))
    }

    // -----------------------------------------------------------------------
    // Sitemaps
    // -----------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn sitemap(&self, url: &str) -> SitemapRecord {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return SitemapRecord::failed(url, format!("invalid URL: {e}")),
        };
        match self.fetcher.fetch(&parsed, SITEMAP_TYPES).await {
            Ok(fetched) => parse_sitemap(&fetched.text(), &parsed),
            Err(e) => SitemapRecord::failed(url, e.to_string()),
        }
    }

    /// Harvest a sitemap and, when asked, the sitemaps it indexes.
    /// `max_nested` bounds the number of nested fetches; the root parse
    /// is always included. Nested failures become error records.
    #[instrument(skip(self))]
    pub async fn sitemap_harvest(
        &self,
        url: &str,
        follow_nested: bool,
        max_nested: usize,
    ) -> Vec<SitemapRecord> {
        let root = self.sitemap(url).await;
        let mut pending: VecDeque<String> = root.nested_sitemaps.iter().cloned().collect();
        let mut seen: HashSet<String> = HashSet::from([root.url.clone()]);
        let mut records = vec![root];

        if !follow_nested {
            return records;
        }

        let mut fetched = 0;
        while let Some(next) = pending.pop_front() {
            if fetched >= max_nested {
                warn!(url, max_nested, "nested sitemap budget exhausted");
                break;
            }
            if !seen.insert(next.clone()) {
                continue;
            }
            fetched += 1;

            let record = self.sitemap(&next).await;
            pending.extend(record.nested_sitemaps.iter().cloned());
            records.push(record);
        }

        records
    }

    #[instrument(skip(self))]
    pub async fn sitemap_and_attest(
        &self,
        url: &str,
        actor: &str,
        follow_nested: bool,
        max_nested: usize,
    ) -> Result<(Vec<SitemapRecord>, Vec<String>)> {
        let sink = self.require_sink()?;

        let records = self.sitemap_harvest(url, follow_nested, max_nested).await;
        let mut ids = Vec::new();
        for record in records.iter().filter(|r| r.error.is_none()) {
            let commands = project_sitemap(record, actor);
            ids.extend(self.submit(sink, &commands).await?);
        }

        info!(url, sitemaps = records.len(), attestations = ids.len(), "sitemap attested");
        Ok((records, ids))
    }

    // -----------------------------------------------------------------------
    // Crawls
    // -----------------------------------------------------------------------

    /// BFS crawl without projection. The sink, when configured, is
    /// still consulted for `skip_attested` probes.
    #[instrument(skip(self, options), fields(max_pages = options.max_pages))]
    pub async fn crawl(&self, url: &str, options: &CrawlOptions) -> Result<Vec<PageRecord>> {
        let parsed = Url::parse(url)
            .map_err(|e| HarvestError::validation(format!("invalid URL {url:?}: {e}")))?;
        Ok(self.crawler.crawl(&parsed, options, self.sink.as_deref()).await)
    }

    /// BFS crawl with per-page projection into the sink. Each page is
    /// projected once, from the record the crawl already fetched.
    #[instrument(skip(self, options), fields(max_pages = options.max_pages))]
    pub async fn crawl_and_attest(
        &self,
        url: &str,
        actor: &str,
        options: &CrawlOptions,
    ) -> Result<(Vec<PageRecord>, Vec<String>)> {
        let sink = self.require_sink()?;
        let pages = self.crawl(url, options).await?;

        let include_external = !options.same_origin_only;
        let mut ids = Vec::new();
        for page in pages.iter().filter(|p| p.error.is_none()) {
            let commands = project_page(page, actor, include_external);
            ids.extend(self.submit(sink, &commands).await?);
        }

        info!(url, pages = pages.len(), attestations = ids.len(), "crawl attested");
        Ok((pages, ids))
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Hand a job off to the external queue.
    pub async fn schedule(&self, job: &Job) -> Result<String> {
        self.require_queue()?.enqueue(job).await
    }

    pub async fn list_jobs(&self, status: Option<&str>, limit: u32) -> Result<Vec<Job>> {
        self.require_queue()?.list_jobs(status, limit).await
    }
}
