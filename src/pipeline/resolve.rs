// src/pipeline/resolve.rs

//! Sequential account resolution with cooperative cancellation.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::DiscoveryError;
use crate::models::{CandidateHandle, ResolvedAccount};
use crate::services::AccountLookup;

/// Progress after each finished lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineProgress {
    pub completed: usize,
    pub total: usize,
    /// 0..=100
    pub percent: u8,
    pub status: String,
}

impl PipelineProgress {
    fn new(completed: usize, total: usize, next: Option<&CandidateHandle>) -> Self {
        let percent = if total == 0 {
            100
        } else {
            (completed * 100 / total) as u8
        };
        let status = match next {
            Some(handle) => format!("Looking up {handle}"),
            None => "Done".to_string(),
        };
        Self {
            completed,
            total,
            percent,
            status,
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: &PipelineProgress);
}

impl<F> ProgressReporter for F
where
    F: Fn(&PipelineProgress) + Send + Sync,
{
    fn report(&self, progress: &PipelineProgress) {
        self(progress)
    }
}

/// Accounts found so far, and the error that ended the run early, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub accounts: Vec<ResolvedAccount>,
    pub error: Option<DiscoveryError>,
}

/// Resolves candidates one at a time, in input order.
///
/// `remoteUserNotFound` results are skipped; any other failure stops the
/// run. Cancelling ends the run at the next await point and yields the
/// accounts found before it with an `aborted` error. Cancellation is
/// permanent, so a cancelled pipeline cannot be reused.
pub struct ResolutionPipeline {
    lookup: Arc<dyn AccountLookup>,
    cancel: CancellationToken,
}

impl ResolutionPipeline {
    pub fn new(lookup: Arc<dyn AccountLookup>) -> Self {
        Self {
            lookup,
            cancel: CancellationToken::new(),
        }
    }

    /// Token shared with callers that cancel from elsewhere.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn run(
        &self,
        candidates: &[CandidateHandle],
        progress: &dyn ProgressReporter,
    ) -> PipelineOutcome {
        let total = candidates.len();
        let mut accounts = Vec::new();
        let mut seen = HashSet::new();

        progress.report(&PipelineProgress::new(0, total, candidates.first()));

        for (index, handle) in candidates.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Self::aborted(accounts);
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Self::aborted(accounts),
                result = self.lookup.lookup(handle) => result,
            };

            match result {
                Ok(account) => {
                    if seen.insert(account.id.clone()) {
                        accounts.push(account);
                    } else {
                        log::debug!("{} resolved to already seen {}", handle, account.id);
                    }
                }
                Err(e) if e.is_not_found() => log::debug!("{} not found, skipping", handle),
                Err(e) => {
                    log::warn!("Lookup of {} failed: {}", handle, e);
                    return PipelineOutcome {
                        accounts,
                        error: Some(e),
                    };
                }
            }

            progress.report(&PipelineProgress::new(
                index + 1,
                total,
                candidates.get(index + 1),
            ));
        }

        PipelineOutcome {
            accounts,
            error: None,
        }
    }

    fn aborted(accounts: Vec<ResolvedAccount>) -> PipelineOutcome {
        log::info!("Resolution cancelled after {} accounts", accounts.len());
        PipelineOutcome {
            accounts,
            error: Some(DiscoveryError::aborted()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscoveryErrorKind as Kind;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Resolves `userN@host` to id `N`; scripted failures by local part.
    #[derive(Default)]
    struct ScriptedLookup {
        calls: AtomicUsize,
        missing: Vec<&'static str>,
        broken: Vec<&'static str>,
        same_id: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl AccountLookup for ScriptedLookup {
        async fn lookup(&self, handle: &CandidateHandle) -> Result<ResolvedAccount, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let user = handle.local_part().unwrap_or_default().to_string();
            if self.missing.contains(&user.as_str()) {
                return Err(DiscoveryError::new(Kind::RemoteUserNotFound));
            }
            if self.broken.contains(&user.as_str()) {
                return Err(DiscoveryError::with_detail(Kind::RemoteUserError, "HTTP 500"));
            }
            let id = if self.same_id { "same".to_string() } else { user.clone() };
            Ok(ResolvedAccount {
                id,
                account: handle.to_string(),
                username: user.clone(),
                name: user,
                followers_count: None,
                following_count: None,
                statuses_count: None,
                url: format!("https://{}/", handle.hostname()),
                avatar_image_url: None,
                following: None,
            })
        }
    }

    fn handles(n: usize) -> Vec<CandidateHandle> {
        (0..n)
            .map(|i| CandidateHandle::parse(&format!("user{i}@host.example")).unwrap())
            .collect()
    }

    fn silent(_: &PipelineProgress) {}

    #[tokio::test]
    async fn test_resolves_in_order_and_skips_not_found() {
        let lookup = Arc::new(ScriptedLookup {
            missing: vec!["user1"],
            ..Default::default()
        });
        let pipeline = ResolutionPipeline::new(lookup.clone());

        let outcome = pipeline.run(&handles(4), &silent).await;

        let ids: Vec<&str> = outcome.accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["user0", "user2", "user3"]);
        assert_eq!(outcome.error, None);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_other_error_halts_with_partial_results() {
        let lookup = Arc::new(ScriptedLookup {
            broken: vec!["user2"],
            ..Default::default()
        });
        let pipeline = ResolutionPipeline::new(lookup.clone());

        let outcome = pipeline.run(&handles(5), &silent).await;

        assert_eq!(outcome.accounts.len(), 2);
        assert_eq!(outcome.error.unwrap().kind, Kind::RemoteUserError);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_duplicate_ids_keep_first() {
        let lookup = Arc::new(ScriptedLookup {
            same_id: true,
            ..Default::default()
        });
        let pipeline = ResolutionPipeline::new(lookup);

        let outcome = pipeline.run(&handles(3), &silent).await;

        assert_eq!(outcome.accounts.len(), 1);
        assert_eq!(outcome.accounts[0].account, "user0@host.example");
    }

    #[tokio::test]
    async fn test_cancel_after_three_of_ten() {
        let lookup = Arc::new(ScriptedLookup::default());
        let pipeline = ResolutionPipeline::new(lookup.clone());
        let token = pipeline.cancel_token();
        let cancel_at_three = move |p: &PipelineProgress| {
            if p.completed == 3 {
                token.cancel();
            }
        };

        let outcome = pipeline.run(&handles(10), &cancel_at_three).await;

        assert_eq!(outcome.accounts.len(), 3);
        assert_eq!(outcome.error, Some(DiscoveryError::aborted()));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_running_lookup() {
        let lookup = Arc::new(ScriptedLookup {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        });
        let pipeline = Arc::new(ResolutionPipeline::new(lookup.clone()));

        let runner = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.run(&handles(2), &silent).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        pipeline.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("cancel must end the run")
            .unwrap();
        assert!(outcome.accounts.is_empty());
        assert_eq!(outcome.error, Some(DiscoveryError::aborted()));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_progress_reports() {
        let seen = Mutex::new(Vec::new());
        let record = |p: &PipelineProgress| seen.lock().unwrap().push(p.clone());
        let pipeline = ResolutionPipeline::new(Arc::new(ScriptedLookup::default()));

        pipeline.run(&handles(2), &record).await;

        let seen = seen.into_inner().unwrap();
        let summary: Vec<(usize, u8, &str)> = seen
            .iter()
            .map(|p| (p.completed, p.percent, p.status.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, 0, "Looking up user0@host.example"),
                (1, 50, "Looking up user1@host.example"),
                (2, 100, "Done"),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_input() {
        let pipeline = ResolutionPipeline::new(Arc::new(ScriptedLookup::default()));
        let outcome = pipeline.run(&[], &silent).await;
        assert!(outcome.accounts.is_empty());
        assert_eq!(outcome.error, None);
    }
}
