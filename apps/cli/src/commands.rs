//! CLI command definitions, routing, and tracing setup.

use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::info;

use webharvest_core::HarvestEngine;
use webharvest_crawler::CrawlOptions;
use webharvest_shared::{config_file_path, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// webharvest — fetch web resources into structured records.
#[derive(Parser)]
#[command(
    name = "webharvest",
    version,
    about = "Harvest pages, feeds, and sitemaps into structured records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch one page and print its record.
    Scrape {
        /// Page URL.
        url: String,

        /// Extract meta, images, structured data, and headings too.
        #[arg(long)]
        full: bool,
    },

    /// Fetch and parse an RSS or Atom feed.
    Feed {
        /// Feed URL.
        url: String,
    },

    /// Fetch and parse a sitemap (urlset or index).
    Sitemap {
        /// Sitemap URL.
        url: String,

        /// Fetch the sitemaps a sitemapindex points at.
        #[arg(long)]
        follow_nested: bool,

        /// Bound on nested sitemap fetches.
        #[arg(long, default_value_t = 10)]
        max_nested: usize,
    },

    /// Breadth-first crawl from a start URL.
    Crawl {
        /// Start URL.
        url: String,

        /// Bound on pages visited.
        #[arg(long, default_value_t = 10)]
        max_pages: usize,

        /// Follow links to other hosts too.
        #[arg(long)]
        all_domains: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "webharvest=info",
        1 => "webharvest=debug",
        _ => "webharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Scrape { url, full } => cmd_scrape(&url, full).await,
        Command::Feed { url } => cmd_feed(&url).await,
        Command::Sitemap {
            url,
            follow_nested,
            max_nested,
        } => cmd_sitemap(&url, follow_nested, max_nested).await,
        Command::Crawl {
            url,
            max_pages,
            all_domains,
        } => cmd_crawl(&url, max_pages, all_domains).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Build an engine from the config file. The CLI drives the engine
/// directly, without sink or queue.
fn build_engine() -> Result<HarvestEngine> {
    let config = load_config()?;
    Ok(HarvestEngine::new(config.harvest, None, None)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_scrape(url: &str, full: bool) -> Result<()> {
    let engine = build_engine()?;
    let record = engine.scrape(url, full).await;
    print_json(&record)
}

async fn cmd_feed(url: &str) -> Result<()> {
    let engine = build_engine()?;
    let record = engine.feed(url).await;
    print_json(&record)
}

async fn cmd_sitemap(url: &str, follow_nested: bool, max_nested: usize) -> Result<()> {
    let engine = build_engine()?;
    let records = engine.sitemap_harvest(url, follow_nested, max_nested).await;
    print_json(&records)
}

async fn cmd_crawl(url: &str, max_pages: usize, all_domains: bool) -> Result<()> {
    let engine = build_engine()?;
    let options = CrawlOptions {
        max_pages,
        same_origin_only: !all_domains,
        skip_attested: false,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner());
    spinner.set_message(format!("crawling {url}"));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let pages = engine.crawl(url, &options).await?;
    spinner.finish_and_clear();

    let errors = pages.iter().filter(|p| p.error.is_some()).count();
    info!(pages = pages.len(), errors, "crawl finished");

    let summary = json!({
        "start_url": url,
        "pages_crawled": pages.len(),
        "errors": errors,
        "pages": pages,
    });
    print_json(&summary)
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("wrote {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    println!("# {}", config_file_path()?.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
