use tracing::trace;

use crate::types::{Message, ScrollAction, ViewportMetrics};

/// Scroll offset from the top below which an older-page load is triggered.
pub const TOP_LOAD_THRESHOLD_PX: f32 = 100.0;
/// Offset from the bottom within which new traffic keeps the viewport pinned.
pub const BOTTOM_FOLLOW_THRESHOLD_PX: f32 = 200.0;

/// Viewport lifecycle phase for the currently rendered chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollPhase {
    /// Waiting for the first successful render after a chat switch.
    InitialLoading,
    /// Viewport pinned to the newest messages.
    SteadyAtBottom,
    /// User scrolled up into history.
    ViewingHistory,
    /// An older-page load was triggered and has not rendered yet.
    LoadingOlder,
}

/// Pure state machine translating load/scroll/arrival events into scroll
/// actions while preserving visual continuity.
///
/// One instance exists per rendered view; [`ScrollCoordinator::reset`] must be
/// called whenever the active chat changes.
#[derive(Debug)]
pub struct ScrollCoordinator {
    phase: ScrollPhase,
    last_scroll_height: f32,
    last_message_count: usize,
    first_message_id: Option<String>,
    snapshot_height: Option<f32>,
}

impl Default for ScrollCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollCoordinator {
    /// Create a coordinator waiting for its first render.
    pub fn new() -> Self {
        Self {
            phase: ScrollPhase::InitialLoading,
            last_scroll_height: 0.0,
            last_message_count: 0,
            first_message_id: None,
            snapshot_height: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> ScrollPhase {
        self.phase
    }

    /// Reset all per-view state. Called on every active-chat change.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Re-enter the initial phase so the next render jumps to the bottom.
    ///
    /// Used when switching to a chat whose history is already loaded: no
    /// network call happens, but the first render must still land at the
    /// newest message.
    pub fn mark_initial_load(&mut self) {
        self.phase = ScrollPhase::InitialLoading;
        self.snapshot_height = None;
    }

    /// Process a viewport scroll report.
    ///
    /// Returns `true` when an older-page load should be triggered: the offset
    /// from the top fell below [`TOP_LOAD_THRESHOLD_PX`] while older pages
    /// remain and no load is in flight. The current scroll height is
    /// snapshotted before the caller issues the fetch.
    pub fn on_scroll(&mut self, metrics: ViewportMetrics, has_more: bool, in_flight: bool) -> bool {
        if matches!(self.phase, ScrollPhase::InitialLoading | ScrollPhase::LoadingOlder) {
            return false;
        }

        if metrics.scroll_top < TOP_LOAD_THRESHOLD_PX && has_more && !in_flight {
            self.snapshot_height = Some(metrics.scroll_height);
            self.transition(ScrollPhase::LoadingOlder);
            return true;
        }

        let next = if metrics.offset_from_bottom() <= BOTTOM_FOLLOW_THRESHOLD_PX {
            ScrollPhase::SteadyAtBottom
        } else {
            ScrollPhase::ViewingHistory
        };
        self.transition(next);
        false
    }

    /// Abort a pending older-page load, e.g. after a fetch failure.
    pub fn abort_older_load(&mut self) {
        if self.phase == ScrollPhase::LoadingOlder {
            self.snapshot_height = None;
            self.transition(ScrollPhase::ViewingHistory);
        }
    }

    /// Process a completed render of the current message list.
    ///
    /// `metrics` are the post-render viewport measurements. The returned
    /// action keeps the viewport visually continuous: instant bottom jump on
    /// the first render, delta-preserving restore after an older page, smooth
    /// follow for own or near-bottom arrivals, untouched otherwise.
    pub fn on_rendered(
        &mut self,
        metrics: ViewportMetrics,
        messages: &[Message],
        local_user_id: &str,
    ) -> ScrollAction {
        let count = messages.len();
        let first_id = messages.first().map(|m| m.id.clone());
        let action = self.classify(metrics, messages, local_user_id, count, &first_id);

        self.last_scroll_height = metrics.scroll_height;
        self.last_message_count = count;
        self.first_message_id = first_id;
        action
    }

    fn classify(
        &mut self,
        metrics: ViewportMetrics,
        messages: &[Message],
        local_user_id: &str,
        count: usize,
        first_id: &Option<String>,
    ) -> ScrollAction {
        if self.phase == ScrollPhase::InitialLoading {
            if count == 0 {
                return ScrollAction::Hold;
            }
            self.transition(ScrollPhase::SteadyAtBottom);
            return ScrollAction::JumpToBottom { smooth: false };
        }

        if count <= self.last_message_count {
            return ScrollAction::Hold;
        }

        // Disambiguate "older page arrived" from "new message while scrolled
        // up": the first loaded id changed, or the list grew near the top and
        // the newest entry is not the local user's own.
        let first_id_changed =
            self.first_message_id.is_some() && *first_id != self.first_message_id;
        let newest_is_own = messages
            .last()
            .is_some_and(|m| m.sender_id == local_user_id);
        let grew_near_top =
            metrics.scroll_top < TOP_LOAD_THRESHOLD_PX && !newest_is_own;
        let older_arrived = first_id_changed || grew_near_top;

        if older_arrived {
            let basis = self.snapshot_height.take().unwrap_or(self.last_scroll_height);
            let delta = metrics.scroll_height - basis;
            self.transition(ScrollPhase::ViewingHistory);
            return ScrollAction::PreserveOffset { delta };
        }

        if newest_is_own || metrics.offset_from_bottom() <= BOTTOM_FOLLOW_THRESHOLD_PX {
            self.transition(ScrollPhase::SteadyAtBottom);
            return ScrollAction::JumpToBottom { smooth: true };
        }

        // Unrelated traffic must not yank a reader out of history.
        if self.phase != ScrollPhase::LoadingOlder {
            self.transition(ScrollPhase::ViewingHistory);
        }
        ScrollAction::Hold
    }

    fn transition(&mut self, next: ScrollPhase) {
        if self.phase != next {
            trace!(from = ?self.phase, to = ?next, "scroll phase changed");
            self.phase = next;
        }
    }
}
