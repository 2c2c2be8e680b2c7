use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::error::SyncError;
use crate::store::ChatStore;
use crate::types::{FetchRequest, MessagePage};

/// Default history page size.
pub const DEFAULT_PAGE_LIMIT: u16 = 50;
/// Hard cap applied to any requested page size.
pub const MAX_PAGE_LIMIT: u16 = 100;

/// Per-chat cursor pagination state.
///
/// `has_more` is monotonic: once `false` it can only become `true` again via
/// [`PaginationEngine::reset_chat`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageState {
    /// Last loaded page (0 when nothing has resolved yet).
    pub page: u32,
    /// Total page count reported by the last resolved load.
    pub total_pages: u32,
    /// Whether older pages remain.
    pub has_more: bool,
    /// Page currently being fetched, when a load is in flight.
    pub in_flight: Option<u32>,
    /// Whether the most recent failed load may be retried.
    pub retryable_failure: bool,
}

impl PageState {
    fn loaded(&self) -> bool {
        self.page > 0
    }
}

/// Paged and cursor/infinite retrieval of message history.
///
/// Fixed-page results are cached by `(chat_id, page)` and served without a
/// network call on repeat requests. Cursor mode accumulates ascending history
/// per chat through [`ChatStore::merge_older_page`].
#[derive(Debug, Default)]
pub struct PaginationEngine {
    limit: u16,
    states: HashMap<String, PageState>,
    fixed_pages: HashMap<(String, u32), MessagePage>,
}

impl PaginationEngine {
    /// Create an engine with the given page size (clamped to `1..=100`).
    pub fn new(limit: u16) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
            states: HashMap::new(),
            fixed_pages: HashMap::new(),
        }
    }

    /// Configured page size.
    pub fn limit(&self) -> u16 {
        self.limit
    }

    /// Cached fixed-page result, when present.
    pub fn fixed_page(&self, chat_id: &str, page: u32) -> Option<&MessagePage> {
        self.fixed_pages.get(&(chat_id.to_owned(), page))
    }

    /// Store a resolved fixed-page result for `(chat_id, page)`.
    pub fn store_fixed_page(&mut self, chat_id: &str, result: MessagePage) {
        self.fixed_pages
            .insert((chat_id.to_owned(), result.page), result);
    }

    /// Begin the initial history load for a chat.
    ///
    /// Returns `None` when the first page already resolved or a load is in
    /// flight; no duplicate fetch is issued either way.
    pub fn begin_initial_load(&mut self, chat_id: &str) -> Option<FetchRequest> {
        let state = self.states.entry(chat_id.to_owned()).or_default();
        if state.loaded() || state.in_flight.is_some() {
            return None;
        }
        state.in_flight = Some(1);
        state.retryable_failure = false;
        debug!(chat_id = %chat_id, "initial history load requested");
        Some(FetchRequest {
            chat_id: chat_id.to_owned(),
            page: 1,
            limit: self.limit,
        })
    }

    /// Begin loading the next older page for a chat.
    ///
    /// A no-op when nothing is loaded yet, `has_more` is `false`, or a load is
    /// already in flight.
    pub fn begin_load_more(&mut self, chat_id: &str) -> Option<FetchRequest> {
        let state = self.states.get_mut(chat_id)?;
        if !state.loaded() || !state.has_more || state.in_flight.is_some() {
            return None;
        }
        let next = state.page + 1;
        state.in_flight = Some(next);
        state.retryable_failure = false;
        debug!(chat_id = %chat_id, page = next, "older page load requested");
        Some(FetchRequest {
            chat_id: chat_id.to_owned(),
            page: next,
            limit: self.limit,
        })
    }

    /// Apply a resolved cursor-mode page.
    ///
    /// The result is discarded unless `(chat_id, page)` matches the load
    /// currently in flight, so late responses for stale requests never touch
    /// state. Returns whether the page was applied.
    pub fn apply_page(&mut self, store: &mut ChatStore, chat_id: &str, result: MessagePage) -> bool {
        let Some(state) = self.states.get_mut(chat_id) else {
            warn!(chat_id = %chat_id, page = result.page, "page resolved for unknown chat; dropped");
            return false;
        };
        if state.in_flight != Some(result.page) {
            trace!(
                chat_id = %chat_id,
                page = result.page,
                "stale page response dropped"
            );
            return false;
        }

        let was_loaded = state.loaded();
        state.in_flight = None;
        state.retryable_failure = false;
        state.page = result.page;
        state.total_pages = result.total_pages;
        let computed = result.page < result.total_pages;
        state.has_more = if was_loaded {
            state.has_more && computed
        } else {
            computed
        };

        store.merge_older_page(chat_id, result.messages);
        debug!(
            chat_id = %chat_id,
            page = result.page,
            total_pages = result.total_pages,
            has_more = state.has_more,
            "history page applied"
        );
        true
    }

    /// Record a failed load without rolling back already loaded history.
    pub fn fail_load(&mut self, chat_id: &str, error: &SyncError) {
        if let Some(state) = self.states.get_mut(chat_id) {
            state.in_flight = None;
            state.retryable_failure = error.is_retryable();
            warn!(
                chat_id = %chat_id,
                code = %error.code,
                retryable = state.retryable_failure,
                "history page load failed"
            );
        }
    }

    /// Drop all pagination state and loaded history for `chat_id`.
    ///
    /// The only way `has_more` can become `true` again after exhaustion.
    pub fn reset_chat(&mut self, store: &mut ChatStore, chat_id: &str) {
        self.states.remove(chat_id);
        self.fixed_pages.retain(|(cached, _), _| cached != chat_id);
        store.clear_messages(chat_id);
    }

    /// Whether older pages remain for `chat_id` (`false` when unknown).
    pub fn has_more(&self, chat_id: &str) -> bool {
        self.states.get(chat_id).is_some_and(|state| state.has_more)
    }

    /// Whether a load is in flight for `chat_id`.
    pub fn is_in_flight(&self, chat_id: &str) -> bool {
        self.states
            .get(chat_id)
            .is_some_and(|state| state.in_flight.is_some())
    }

    /// Whether the most recent failed load for `chat_id` may be retried.
    pub fn last_failure_retryable(&self, chat_id: &str) -> bool {
        self.states
            .get(chat_id)
            .is_some_and(|state| state.retryable_failure)
    }

    /// Current per-chat state snapshot.
    pub fn state(&self, chat_id: &str) -> PageState {
        self.states.get(chat_id).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::types::Message;

    fn message(id: &str, chat_id: &str, created_at_ms: u64) -> Message {
        Message {
            id: id.to_owned(),
            chat_id: chat_id.to_owned(),
            sender_id: "user-b".to_owned(),
            content: String::new(),
            created_at_ms,
            read_by: HashSet::new(),
        }
    }

    // Three pages of 50 messages; page 1 is the newest slice.
    fn page(chat_id: &str, page_no: u32, total_pages: u32) -> MessagePage {
        let newest_ts = 10_000;
        let page_span = 50 * 10;
        let base = newest_ts - page_no as u64 * page_span;
        let messages = (0..50)
            .map(|i| {
                message(
                    &format!("p{page_no}-m{i}"),
                    chat_id,
                    base + i as u64 * 10,
                )
            })
            .collect();
        MessagePage {
            messages,
            page: page_no,
            total_pages,
        }
    }

    #[test]
    fn walks_three_pages_then_stops() {
        let mut store = ChatStore::new();
        let mut engine = PaginationEngine::new(50);

        let initial = engine.begin_initial_load("c1").expect("initial load");
        assert_eq!(initial.page, 1);
        assert!(engine.apply_page(&mut store, "c1", page("c1", 1, 3)));
        assert_eq!(store.messages("c1").len(), 50);
        assert!(engine.has_more("c1"));

        let second = engine.begin_load_more("c1").expect("second page load");
        assert_eq!(second.page, 2);
        assert!(engine.apply_page(&mut store, "c1", page("c1", 2, 3)));
        assert_eq!(store.messages("c1").len(), 100);
        assert!(engine.has_more("c1"));

        let third = engine.begin_load_more("c1").expect("third page load");
        assert_eq!(third.page, 3);
        assert!(engine.apply_page(&mut store, "c1", page("c1", 3, 3)));
        assert_eq!(store.messages("c1").len(), 150);
        assert!(!engine.has_more("c1"));

        // Exhausted: no request, no state change.
        assert_eq!(engine.begin_load_more("c1"), None);
        assert_eq!(store.messages("c1").len(), 150);
    }

    #[test]
    fn merged_history_stays_sorted_and_unique() {
        let mut store = ChatStore::new();
        let mut engine = PaginationEngine::new(50);

        engine.begin_initial_load("c1").expect("initial load");
        engine.apply_page(&mut store, "c1", page("c1", 1, 3));
        engine.begin_load_more("c1").expect("second page load");
        engine.apply_page(&mut store, "c1", page("c1", 2, 3));

        let messages = store.messages("c1");
        let mut ids = HashSet::new();
        for pair in messages.windows(2) {
            assert!(pair[0].created_at_ms <= pair[1].created_at_ms);
        }
        for m in messages {
            assert!(ids.insert(m.id.clone()), "duplicate id {}", m.id);
        }
    }

    #[test]
    fn suppresses_duplicate_requests_while_in_flight() {
        let mut store = ChatStore::new();
        let mut engine = PaginationEngine::new(50);

        engine.begin_initial_load("c1").expect("initial load");
        assert_eq!(engine.begin_initial_load("c1"), None);
        engine.apply_page(&mut store, "c1", page("c1", 1, 3));

        engine.begin_load_more("c1").expect("load more");
        assert_eq!(engine.begin_load_more("c1"), None);
        assert!(engine.is_in_flight("c1"));
    }

    #[test]
    fn drops_stale_page_responses() {
        let mut store = ChatStore::new();
        let mut engine = PaginationEngine::new(50);

        engine.begin_initial_load("c1").expect("initial load");
        // A page that was never requested must not be applied.
        assert!(!engine.apply_page(&mut store, "c1", page("c1", 2, 3)));
        assert_eq!(store.messages("c1").len(), 0);

        // A response for a chat with no pagination state is dropped outright.
        assert!(!engine.apply_page(&mut store, "c2", page("c2", 1, 3)));
    }

    #[test]
    fn failed_load_keeps_history_and_allows_retry() {
        let mut store = ChatStore::new();
        let mut engine = PaginationEngine::new(50);

        engine.begin_initial_load("c1").expect("initial load");
        engine.apply_page(&mut store, "c1", page("c1", 1, 3));

        engine.begin_load_more("c1").expect("load more");
        engine.fail_load("c1", &SyncError::network("timeout", "request timed out"));

        assert_eq!(store.messages("c1").len(), 50);
        assert!(engine.last_failure_retryable("c1"));
        assert!(!engine.is_in_flight("c1"));
        // Retry path opens up again.
        assert!(engine.begin_load_more("c1").is_some());
    }

    #[test]
    fn fixed_pages_are_cached_by_chat_and_page() {
        let mut engine = PaginationEngine::new(50);
        assert!(engine.fixed_page("c1", 2).is_none());

        engine.store_fixed_page("c1", page("c1", 2, 3));
        let cached = engine.fixed_page("c1", 2).expect("cached page");
        assert_eq!(cached.messages.len(), 50);
        assert!(engine.fixed_page("c1", 1).is_none());
        assert!(engine.fixed_page("c2", 2).is_none());
    }

    #[test]
    fn reset_allows_has_more_to_recover() {
        let mut store = ChatStore::new();
        let mut engine = PaginationEngine::new(50);

        engine.begin_initial_load("c1").expect("initial load");
        engine.apply_page(&mut store, "c1", page("c1", 1, 1));
        assert!(!engine.has_more("c1"));
        assert_eq!(engine.begin_load_more("c1"), None);

        engine.reset_chat(&mut store, "c1");
        assert_eq!(store.messages("c1").len(), 0);
        let request = engine.begin_initial_load("c1").expect("fresh initial load");
        assert_eq!(request.page, 1);
        engine.apply_page(&mut store, "c1", page("c1", 1, 3));
        assert!(engine.has_more("c1"));
    }

    #[test]
    fn clamps_configured_limit() {
        assert_eq!(PaginationEngine::new(0).limit(), 1);
        assert_eq!(PaginationEngine::new(50).limit(), 50);
        assert_eq!(PaginationEngine::new(500).limit(), MAX_PAGE_LIMIT);
    }
}
