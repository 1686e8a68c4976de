//! fediresolve: fediverse account resolver
//!
//! Resolves handles and profile URLs to accounts and writes one JSON
//! account per line to stdout. Ctrl-C stops the run and keeps what was
//! found so far.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use fediscover::{
    config::{load_config, load_handles},
    error::{AppError, Result},
    models::CandidateHandle,
    pipeline::{PipelineProgress, ResolutionPipeline},
    services::{AccountLookup, AccountResolver, HomeInstanceLookup, UnsignedRequests},
    utils::ReqwestFetcher,
};

/// Resolve fediverse handles to accounts
#[derive(Parser, Debug)]
#[command(name = "fediresolve", version, about = "Fediverse account resolver")]
struct Cli {
    /// Handles (`user@host`) or profile URLs
    handles: Vec<String>,

    /// Read handles from a file, one per line
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Home instance used for authenticated lookups
    #[arg(long, requires = "token")]
    instance: Option<String>,

    /// Access token for the home instance
    #[arg(long)]
    token: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

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

fn collect_candidates(cli: &Cli) -> Result<Vec<CandidateHandle>> {
    let mut candidates = Vec::new();
    for raw in &cli.handles {
        let handle = CandidateHandle::parse(raw).map_err(|e| AppError::argument(raw, e))?;
        candidates.push(handle);
    }
    if let Some(path) = &cli.input {
        candidates.extend(load_handles(path)?);
    }
    if candidates.is_empty() {
        return Err(AppError::config("no handles given; pass them as arguments or with --input"));
    }
    Ok(candidates)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let candidates = collect_candidates(&cli)?;
    let fetcher = Arc::new(ReqwestFetcher::new(&config.resolver.user_agent)?);

    let instance = cli.instance.clone().or(config.resolver.instance_url.clone());
    let lookup: Arc<dyn AccountLookup> = match (instance, cli.token.clone()) {
        (Some(instance), Some(token)) => {
            log::info!("Looking up accounts through {}", instance);
            Arc::new(HomeInstanceLookup::new(fetcher, &instance, token)?)
        }
        (Some(instance), None) => {
            log::warn!("No access token for {}; resolving accounts directly", instance);
            Arc::new(AccountResolver::new(fetcher, Arc::new(UnsignedRequests)))
        }
        (None, _) => Arc::new(AccountResolver::new(fetcher, Arc::new(UnsignedRequests))),
    };

    let pipeline = ResolutionPipeline::new(lookup);
    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; finishing with partial results");
            cancel.cancel();
        }
    });

    let report = |p: &PipelineProgress| log::info!("[{:>3}%] {}", p.percent, p.status);
    let outcome = pipeline.run(&candidates, &report).await;

    let mut stdout = io::stdout().lock();
    for account in &outcome.accounts {
        writeln!(stdout, "{}", serde_json::to_string(account)?)?;
    }
    stdout.flush()?;

    log::info!(
        "Resolved {} of {} candidates",
        outcome.accounts.len(),
        candidates.len()
    );
    match outcome.error {
        Some(e) if e.kind == fediscover::error::DiscoveryErrorKind::Aborted => Ok(()),
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
