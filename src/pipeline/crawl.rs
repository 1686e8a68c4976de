// src/pipeline/crawl.rs

//! Instance crawling pipeline.
//!
//! Starting from seed domains, every compatible Mastodon instance is
//! resolved and its peer list feeds the frontier, until nothing is left to
//! visit. Each processed domain produces events on the sink; nothing is
//! returned except a summary.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use tokio::task::JoinError;

use crate::error::{DiscoveryError, DiscoveryErrorKind as Kind};
use crate::models::{CrawlEvent, CrawlerConfig, EventSink};
use crate::pipeline::frontier::Frontier;
use crate::pipeline::limiter::{Limiter, Slot};
use crate::services::ProtocolResolver;
use crate::utils::url::{get_domain, normalize_host};

/// Lifecycle of one crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    /// Domains are queued and being dispatched.
    Running,
    /// Queue is empty; waiting for in-flight domains.
    Draining,
    Done,
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub visited: usize,
    pub instances: usize,
    pub errors: usize,
    pub skipped_peer_lists: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    Instance { peers_trusted: bool },
    /// Resolved to an instance already reported under another alias.
    Duplicate,
    Failed,
}

type StepTask = BoxFuture<'static, (String, Result<StepOutcome, JoinError>)>;

struct StepContext {
    resolver: ProtocolResolver,
    frontier: Arc<Frontier>,
    sink: Arc<dyn EventSink>,
    anchor: String,
}

/// Crawls the federation graph with bounded concurrency.
pub struct InstanceCrawler {
    resolver: ProtocolResolver,
    limiter: Limiter,
    anchor: String,
}

impl InstanceCrawler {
    pub fn new(resolver: ProtocolResolver, config: &CrawlerConfig) -> Self {
        Self {
            resolver,
            limiter: Limiter::new(config.max_concurrent),
            anchor: config.anchor_instance.clone(),
        }
    }

    /// Crawl from `seeds` until the frontier is exhausted.
    ///
    /// Seeds are host-normalized; invalid ones are ignored. Domains in
    /// `skip` are never fetched.
    pub async fn run(
        &self,
        seeds: &[String],
        skip: HashSet<String>,
        sink: Arc<dyn EventSink>,
    ) -> CrawlSummary {
        let started_at = Utc::now();
        let frontier = Arc::new(Frontier::new(skip));
        for seed in seeds {
            match normalize_host(seed) {
                Some(host) => {
                    frontier.enqueue(&host);
                }
                None => log::warn!("Ignoring invalid seed domain '{}'", seed),
            }
        }

        let ctx = Arc::new(StepContext {
            resolver: self.resolver.clone(),
            frontier: Arc::clone(&frontier),
            sink: Arc::clone(&sink),
            anchor: self.anchor.clone(),
        });

        let mut summary = CrawlSummary {
            started_at,
            finished_at: started_at,
            visited: 0,
            instances: 0,
            errors: 0,
            skipped_peer_lists: 0,
        };
        let mut phase = CrawlPhase::Idle;
        let mut tasks: FuturesUnordered<StepTask> = FuturesUnordered::new();
        let mut stopping = false;

        loop {
            if !stopping && sink.is_closed() {
                log::warn!(
                    "Event output closed; stopping with {} domains still queued",
                    frontier.remaining()
                );
                stopping = true;
            }
            if tasks.is_empty() && (stopping || frontier.is_done()) {
                break;
            }
            let next = if frontier.has_queued() && !stopping {
                CrawlPhase::Running
            } else {
                CrawlPhase::Draining
            };
            Self::transition(&mut phase, next);

            tokio::select! {
                biased;

                Some((uri, joined)) = tasks.next() => {
                    match joined {
                        Ok(outcome) => match outcome {
                            StepOutcome::Instance { peers_trusted } => {
                                summary.instances += 1;
                                if !peers_trusted {
                                    summary.skipped_peer_lists += 1;
                                }
                            }
                            StepOutcome::Duplicate => {}
                            StepOutcome::Failed => summary.errors += 1,
                        },
                        Err(e) => {
                            log::error!("Crawl task for {} aborted: {}", uri, e);
                            summary.errors += 1;
                            sink.emit(CrawlEvent::error(
                                uri.as_str(),
                                DiscoveryError::with_detail(Kind::MastodonCrawlError, &e),
                            ));
                            let completion = frontier.finish(&uri);
                            sink.emit(CrawlEvent::Progress {
                                visited: completion.visited,
                                remaining: completion.remaining,
                            });
                        }
                    }
                }

                slot = self.limiter.acquire(), if !stopping && frontier.has_queued() => {
                    if let Some(uri) = frontier.take() {
                        log::debug!("Dispatching {}", uri);
                        let handle = tokio::spawn(crawl_step(Arc::clone(&ctx), uri.clone(), slot));
                        tasks.push(Box::pin(async move { (uri, handle.await) }));
                    }
                }

                else => break,
            }
        }

        Self::transition(&mut phase, CrawlPhase::Done);
        summary.visited = frontier.visited_count();
        summary.finished_at = Utc::now();
        log::info!(
            "Crawl finished: {} visited, {} instances, {} errors, {} peer lists skipped",
            summary.visited,
            summary.instances,
            summary.errors,
            summary.skipped_peer_lists
        );
        summary
    }

    fn transition(phase: &mut CrawlPhase, next: CrawlPhase) {
        if *phase != next {
            log::debug!("Crawl phase {:?} -> {:?}", phase, next);
            *phase = next;
        }
    }
}

/// Resolve one domain and publish what was learned.
async fn crawl_step(ctx: Arc<StepContext>, uri: String, _slot: Slot) -> StepOutcome {
    let outcome = match ctx.resolver.resolve(&uri).await {
        Ok(found) => {
            let record = found.instance;
            let host = get_domain(&record.instance_url).unwrap_or_default();
            let aliases = [uri.as_str(), host.as_str()];
            let aliases = if host.is_empty() { &aliases[..1] } else { &aliases[..] };

            if ctx.frontier.mark_resolved(aliases, &record.uri) {
                let peers_trusted = uri == ctx.anchor
                    || record.uri == ctx.anchor
                    || found
                        .peers
                        .iter()
                        .any(|peer| normalize_host(peer).as_deref() == Some(ctx.anchor.as_str()));

                let domain = record.uri.clone();
                ctx.sink.emit(CrawlEvent::Instance { instance: record });

                if peers_trusted {
                    let added = ctx
                        .frontier
                        .enqueue_all(found.peers.iter().filter_map(|peer| normalize_host(peer)));
                    log::debug!("{}: {} of {} peers queued", uri, added, found.peers.len());
                } else {
                    log::debug!("{}: peer list does not include {}", uri, ctx.anchor);
                    ctx.sink.emit(CrawlEvent::SkipPeers {
                        domain,
                        count: found.peers.len(),
                    });
                }
                StepOutcome::Instance { peers_trusted }
            } else {
                log::debug!("{} is an alias of already reported {}", uri, record.uri);
                StepOutcome::Duplicate
            }
        }
        Err(e) => {
            log::debug!("{}: {}", uri, e);
            ctx.sink.emit(CrawlEvent::error(uri.as_str(), e));
            StepOutcome::Failed
        }
    };

    let completion = ctx.frontier.finish(&uri);
    ctx.sink.emit(CrawlEvent::Progress {
        visited: completion.visited,
        remaining: completion.remaining,
    });
    outcome
}
