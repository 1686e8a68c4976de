//! fedicrawl: Mastodon instance crawler
//!
//! Crawls the federation graph from one domain and writes one JSON event
//! per line to stdout. Logs go to stderr.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use fediscover::{
    config::{load_config, load_skip_list},
    error::{AppError, Result},
    pipeline::{InstanceCrawler, JsonLinesSink},
    services::ProtocolResolver,
    utils::{ReqwestFetcher, is_valid_domain},
};

/// Discover Mastodon instances by walking peer lists
#[derive(Parser, Debug)]
#[command(name = "fedicrawl", version, about = "Mastodon federation crawler")]
struct Cli {
    /// Domain to start crawling from
    domain: String,

    /// JSON file with an array of domains that are never crawled
    skip_file: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of domains resolved at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Instance whose presence in a peer list makes that list trusted
    #[arg(long)]
    anchor: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !is_valid_domain(&cli.domain) {
        return Err(AppError::argument(&cli.domain, "not a valid domain name"));
    }

    let skip = match &cli.skip_file {
        Some(path) => load_skip_list(path)?,
        None => Default::default(),
    };

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(concurrency) = cli.concurrency {
        config.crawler.max_concurrent = concurrency;
    }
    if let Some(anchor) = cli.anchor {
        config.crawler.anchor_instance = anchor;
    }
    if let Some(timeout) = cli.timeout {
        config.crawler.timeout_secs = timeout;
    }
    config.validate()?;

    log::info!(
        "Crawling from {} (concurrency {}, anchor {}, {} skipped domains)",
        cli.domain,
        config.crawler.max_concurrent,
        config.crawler.anchor_instance,
        skip.len()
    );

    let fetcher = Arc::new(ReqwestFetcher::new(&config.crawler.user_agent)?);
    let resolver = ProtocolResolver::new(fetcher, &config.crawler);
    let crawler = InstanceCrawler::new(resolver, &config.crawler);
    let sink = Arc::new(JsonLinesSink::new(io::stdout()));

    let summary = crawler.run(&[cli.domain], skip, sink).await;

    let elapsed = summary.finished_at - summary.started_at;
    log::info!(
        "Done in {}s: {} instances out of {} visited domains",
        elapsed.num_seconds(),
        summary.instances,
        summary.visited
    );
    Ok(())
}
