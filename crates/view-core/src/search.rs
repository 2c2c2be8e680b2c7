use tracing::{debug, trace};

use crate::error::SyncError;
use crate::types::{SearchRequest, SearchSnapshot, UserProfile};

/// Quiescence window before a settled term is searched.
pub const SEARCH_DEBOUNCE_MS: u64 = 300;
/// Minimum trimmed term length that triggers a search.
pub const SEARCH_MIN_TERM_LEN: usize = 2;

/// Debounced, cancellable live-search engine.
///
/// Deterministic: all timing flows through explicit `now_ms` arguments. The
/// owner schedules a wake-up for [`SearchEngine::next_deadline_ms`] and calls
/// [`SearchEngine::poll`] when it elapses. Every issued call carries a
/// generation tag; responses whose generation is no longer current are
/// discarded, so a slow response for an old term can never overwrite results
/// for a newer one.
#[derive(Debug)]
pub struct SearchEngine {
    debounce_ms: u64,
    min_term_len: usize,
    term: String,
    results: Vec<UserProfile>,
    loading: bool,
    error: Option<SyncError>,
    pending_term: Option<String>,
    deadline_ms: Option<u64>,
    generation: u64,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE_MS, SEARCH_MIN_TERM_LEN)
    }
}

impl SearchEngine {
    /// Create an engine with the given debounce window and minimum length.
    pub fn new(debounce_ms: u64, min_term_len: usize) -> Self {
        Self {
            debounce_ms: debounce_ms.max(1),
            min_term_len: min_term_len.max(1),
            term: String::new(),
            results: Vec::new(),
            loading: false,
            error: None,
            pending_term: None,
            deadline_ms: None,
            generation: 0,
        }
    }

    /// Record a keystroke at `now_ms`.
    ///
    /// Terms shorter than the minimum clear results and error, cancel any
    /// pending timer, and issue no call. Longer terms restart the quiescence
    /// window; only the last input within the window is searched.
    pub fn set_term(&mut self, term: impl Into<String>, now_ms: u64) {
        self.term = term.into();
        let trimmed = self.term.trim();

        // Any input supersedes whatever was pending or in flight.
        self.generation += 1;
        self.deadline_ms = None;
        self.pending_term = None;

        if trimmed.len() < self.min_term_len {
            trace!(term = %self.term, "term below minimum length; search cleared");
            self.results.clear();
            self.error = None;
            self.loading = false;
            return;
        }

        self.pending_term = Some(trimmed.to_owned());
        self.deadline_ms = Some(now_ms + self.debounce_ms);
        self.loading = true;
    }

    /// Deadline of the pending debounce window, when one is armed.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    /// Fire the pending search once its quiescence window has elapsed.
    pub fn poll(&mut self, now_ms: u64) -> Option<SearchRequest> {
        let deadline = self.deadline_ms?;
        if now_ms < deadline {
            return None;
        }
        self.deadline_ms = None;
        let term = self.pending_term.take()?;
        debug!(term = %term, generation = self.generation, "debounced search issued");
        Some(SearchRequest {
            term,
            generation: self.generation,
        })
    }

    /// Apply a successful response. Returns `false` for stale generations.
    pub fn apply_success(&mut self, generation: u64, results: Vec<UserProfile>) -> bool {
        if generation != self.generation {
            trace!(generation, current = self.generation, "stale search response dropped");
            return false;
        }
        self.results = results;
        self.error = None;
        self.loading = false;
        true
    }

    /// Apply a failed response. Returns `false` for stale generations.
    ///
    /// Failure clears results so the UI can distinguish "search failed" from
    /// "no results".
    pub fn apply_failure(&mut self, generation: u64, error: SyncError) -> bool {
        if generation != self.generation {
            trace!(generation, current = self.generation, "stale search failure dropped");
            return false;
        }
        self.results.clear();
        self.error = Some(error);
        self.loading = false;
        true
    }

    /// Synchronously clear term, results, and error, cancelling any pending
    /// timer or in-flight call.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.term.clear();
        self.results.clear();
        self.error = None;
        self.loading = false;
        self.pending_term = None;
        self.deadline_ms = None;
    }

    /// Current state snapshot for the rendering layer.
    pub fn snapshot(&self) -> SearchSnapshot {
        SearchSnapshot {
            term: self.term.clone(),
            results: self.results.clone(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}
