// src/pipeline/frontier.rs

//! Crawl frontier: which domains are queued, running, and finished.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct FrontierState {
    visited: HashSet<String>,
    skip: HashSet<String>,
    queued: VecDeque<String>,
    queued_set: HashSet<String>,
    in_flight: HashSet<String>,
    claimed: HashSet<String>,
}

/// Snapshot taken when a domain finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub visited: usize,
    pub remaining: usize,
}

/// Shared crawl state.
///
/// A domain moves `queued -> in flight -> visited` and never back. Domains
/// in the skip list or already visited are rejected by [`Frontier::enqueue`]
/// and never dispatched.
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
}

impl Frontier {
    pub fn new(skip: impl IntoIterator<Item = String>) -> Self {
        Self {
            state: Mutex::new(FrontierState {
                skip: skip.into_iter().collect(),
                ..FrontierState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `uri` unless it is known in any way. Returns whether it was added.
    pub fn enqueue(&self, uri: &str) -> bool {
        Self::enqueue_locked(&mut self.state(), uri)
    }

    /// Queue several domains under one lock; returns how many were added.
    pub fn enqueue_all<I, S>(&self, uris: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state();
        uris.into_iter()
            .filter(|uri| Self::enqueue_locked(&mut state, uri.as_ref()))
            .count()
    }

    fn enqueue_locked(state: &mut FrontierState, uri: &str) -> bool {
        if state.visited.contains(uri)
            || state.skip.contains(uri)
            || state.in_flight.contains(uri)
            || state.queued_set.contains(uri)
        {
            return false;
        }
        state.queued_set.insert(uri.to_string());
        state.queued.push_back(uri.to_string());
        true
    }

    /// Move the oldest queued domain to in flight.
    pub fn take(&self) -> Option<String> {
        let mut state = self.state();
        while let Some(uri) = state.queued.pop_front() {
            // Entries marked visited while queued are dropped here.
            if !state.queued_set.remove(&uri) {
                continue;
            }
            state.in_flight.insert(uri.clone());
            return Some(uri);
        }
        None
    }

    /// Record aliases learned for a resolved instance and claim its
    /// canonical uri.
    ///
    /// Every alias that is not itself in flight is marked visited and
    /// removed from the queue. Returns `true` only for the first caller
    /// claiming `canonical`.
    pub fn mark_resolved(&self, aliases: &[&str], canonical: &str) -> bool {
        let mut state = self.state();
        for uri in aliases.iter().chain(std::iter::once(&canonical)) {
            Self::mark_visited_locked(&mut state, uri);
        }
        state.claimed.insert(canonical.to_string())
    }

    /// Mark several domains visited at once.
    ///
    /// Queued entries are dropped; in-flight ones become visited when they
    /// finish.
    pub fn mark_visited(&self, uris: &[&str]) {
        let mut state = self.state();
        for uri in uris {
            Self::mark_visited_locked(&mut state, uri);
        }
    }

    fn mark_visited_locked(state: &mut FrontierState, uri: &str) {
        state.queued_set.remove(uri);
        if !state.in_flight.contains(uri) {
            state.visited.insert(uri.to_string());
        }
    }

    /// Mark `uri` finished.
    pub fn finish(&self, uri: &str) -> Completion {
        let mut state = self.state();
        state.in_flight.remove(uri);
        state.visited.insert(uri.to_string());
        Completion {
            visited: state.visited.len(),
            remaining: state.queued_set.len(),
        }
    }

    pub fn has_queued(&self) -> bool {
        !self.state().queued_set.is_empty()
    }

    pub fn is_done(&self) -> bool {
        let state = self.state();
        state.queued_set.is_empty() && state.in_flight.is_empty()
    }

    pub fn is_visited(&self, uri: &str) -> bool {
        self.state().visited.contains(uri)
    }

    pub fn visited_count(&self) -> usize {
        self.state().visited.len()
    }

    pub fn remaining(&self) -> usize {
        self.state().queued_set.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.state().in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_enqueue_rejects_known_domains() {
        let frontier = Frontier::new(["spam.example".to_string()]);
        assert!(frontier.enqueue("a.example"));
        assert!(!frontier.enqueue("a.example"));
        assert!(!frontier.enqueue("spam.example"));

        let uri = frontier.take().unwrap();
        assert!(!frontier.enqueue(&uri));
        frontier.finish(&uri);
        assert!(!frontier.enqueue(&uri));
        assert!(frontier.is_done());
    }

    #[test]
    fn test_take_is_fifo() {
        let frontier = Frontier::default();
        assert_eq!(frontier.enqueue_all(["a.example", "b.example", "c.example"]), 3);
        assert_eq!(frontier.take().as_deref(), Some("a.example"));
        assert_eq!(frontier.take().as_deref(), Some("b.example"));
        assert_eq!(frontier.take().as_deref(), Some("c.example"));
        assert_eq!(frontier.take(), None);
    }

    #[test]
    fn test_mark_resolved_drops_queued_alias() {
        let frontier = Frontier::default();
        frontier.enqueue_all(["www.example.com", "example.com"]);

        let uri = frontier.take().unwrap();
        assert_eq!(uri, "www.example.com");
        assert!(frontier.mark_resolved(&[uri.as_str()], "example.com"));
        assert!(frontier.is_visited("example.com"));
        assert!(!frontier.is_visited("www.example.com"));
        assert_eq!(frontier.take(), None);

        let done = frontier.finish(&uri);
        assert!(frontier.is_done());
        assert_eq!(done.visited, 2);
        assert_eq!(done.remaining, 0);
    }

    #[test]
    fn test_mark_visited_blocks_enqueue() {
        let frontier = Frontier::default();
        frontier.enqueue("a.example");
        frontier.mark_visited(&["a.example", "b.example"]);

        assert!(!frontier.enqueue("b.example"));
        assert_eq!(frontier.take(), None);
        assert!(frontier.is_done());
        assert_eq!(frontier.visited_count(), 2);
    }

    #[test]
    fn test_canonical_claimed_once() {
        let frontier = Frontier::default();
        frontier.enqueue_all(["www.example.com", "example.com"]);
        let first = frontier.take().unwrap();
        let second = frontier.take().unwrap();

        assert!(frontier.mark_resolved(&[first.as_str()], "example.com"));
        assert!(!frontier.mark_resolved(&[second.as_str()], "example.com"));
        frontier.finish(&first);
        assert!(!frontier.is_done());
        frontier.finish(&second);
        assert!(frontier.is_done());
    }

    #[test]
    fn test_completion_counts() {
        let frontier = Frontier::default();
        frontier.enqueue_all(["a.example", "b.example", "c.example"]);
        let a = frontier.take().unwrap();
        let completion = frontier.finish(&a);
        assert_eq!(
            completion,
            Completion {
                visited: 1,
                remaining: 2
            }
        );
        assert_eq!(frontier.in_flight_count(), 0);
        assert_eq!(frontier.remaining(), 2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enqueue(u8),
        Take,
        Finish(u8),
        Resolve(u8, u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..12).prop_map(Op::Enqueue),
            Just(Op::Take),
            (0u8..12).prop_map(Op::Finish),
            (0u8..12, 0u8..12).prop_map(|(a, b)| Op::Resolve(a, b)),
        ]
    }

    fn domain(i: u8) -> String {
        format!("d{i}.example")
    }

    proptest! {
        #[test]
        fn prop_never_dispatches_skipped_or_visited(
            skip in proptest::collection::hash_set(0u8..12, 0..4),
            ops in proptest::collection::vec(op(), 1..80),
        ) {
            let skip: HashSet<String> = skip.into_iter().map(domain).collect();
            let frontier = Frontier::new(skip.clone());
            let mut dispatched = HashSet::new();
            let mut running: Vec<String> = Vec::new();

            for op in ops {
                match op {
                    Op::Enqueue(i) => {
                        frontier.enqueue(&domain(i));
                    }
                    Op::Take => {
                        if let Some(uri) = frontier.take() {
                            prop_assert!(!skip.contains(&uri));
                            prop_assert!(!frontier.is_visited(&uri));
                            prop_assert!(dispatched.insert(uri.clone()), "dispatched twice: {uri}");
                            running.push(uri);
                        }
                    }
                    Op::Finish(i) => {
                        if !running.is_empty() {
                            let uri = running.remove(i as usize % running.len());
                            frontier.finish(&uri);
                        }
                    }
                    Op::Resolve(i, j) => {
                        if let Some(uri) = running.get(i as usize % running.len().max(1)).cloned() {
                            frontier.mark_resolved(&[uri.as_str()], &domain(j));
                        }
                    }
                }
            }

            prop_assert_eq!(frontier.in_flight_count(), running.len());
            prop_assert_eq!(frontier.is_done(), running.is_empty() && !frontier.has_queued());
        }
    }
}
