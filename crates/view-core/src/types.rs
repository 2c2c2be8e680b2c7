use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// One message inside a chat timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Globally unique message ID.
    pub id: String,
    /// Chat this message belongs to.
    pub chat_id: String,
    /// Author user ID.
    pub sender_id: String,
    /// Display-ready text body.
    pub content: String,
    /// Creation timestamp in milliseconds since Unix epoch.
    pub created_at_ms: u64,
    /// User IDs that have acknowledged reading this message.
    pub read_by: HashSet<String>,
}

impl Message {
    /// Whether `user_id` has already read this message.
    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.contains(user_id)
    }
}

/// Lightweight chat metadata for the sidebar chat list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSummary {
    /// Chat ID.
    pub chat_id: String,
    /// Participant user IDs.
    pub participant_ids: Vec<String>,
    /// Most recent message when known.
    pub last_message: Option<Message>,
}

/// Public profile payload returned by user lookup and search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    /// User ID.
    pub user_id: String,
    /// Display name.
    pub display_name: String,
    /// Optional avatar image URL.
    pub avatar_url: Option<String>,
}

/// One page of history returned by the remote message endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePage {
    /// Messages in ascending `created_at_ms` order.
    pub messages: Vec<Message>,
    /// Page number this payload covers (1-based).
    pub page: u32,
    /// Total page count reported by the remote side.
    pub total_pages: u32,
}

/// Pagination fetch the runtime must issue against the remote endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchRequest {
    /// Target chat ID.
    pub chat_id: String,
    /// Requested page (1-based).
    pub page: u32,
    /// Page size.
    pub limit: u16,
}

/// Search call the runtime must issue once the debounce window elapses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRequest {
    /// Settled search term.
    pub term: String,
    /// Generation tag used by the late-response guard.
    pub generation: u64,
}

/// Viewport measurements reported by the rendering layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ViewportMetrics {
    /// Scroll offset from the top of the content, in pixels.
    pub scroll_top: f32,
    /// Total scrollable content height, in pixels.
    pub scroll_height: f32,
    /// Visible viewport height, in pixels.
    pub viewport_height: f32,
}

impl ViewportMetrics {
    /// Distance between the bottom of the viewport and the bottom of the content.
    pub fn offset_from_bottom(&self) -> f32 {
        (self.scroll_height - (self.scroll_top + self.viewport_height)).max(0.0)
    }
}

/// Scroll adjustment the rendering layer must apply after a timeline change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ScrollAction {
    /// Scroll to the bottom, instantly or with smooth animation.
    JumpToBottom { smooth: bool },
    /// Shift `scroll_top` by `delta` so previously visible messages stay fixed.
    PreserveOffset { delta: f32 },
    /// Leave the viewport untouched.
    Hold,
}

/// UI-originated command accepted by the view runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ViewCommand {
    /// User selected a chat in the sidebar.
    ActivateChat {
        /// Target chat ID.
        chat_id: String,
    },
    /// Viewport scroll position changed.
    ViewportScrolled {
        /// Current viewport measurements.
        metrics: ViewportMetrics,
    },
    /// The rendering layer finished laying out the current message list.
    MessagesRendered {
        /// Post-render viewport measurements.
        metrics: ViewportMetrics,
    },
    /// Live-search input changed.
    SearchInput {
        /// Raw input text.
        term: String,
    },
    /// Live-search panel dismissed.
    SearchReset,
    /// User requested a profile card for `user_id`.
    OpenProfile {
        /// Target user ID.
        user_id: String,
    },
    /// Profile card dismissed.
    CloseProfile,
    /// Stop the runtime loop.
    Shutdown,
}

/// Inbound event pushed by the real-time channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// A new message arrived for some chat.
    NewMessage(Message),
    /// A user acknowledged reading a message.
    MessageRead {
        /// Chat the message belongs to.
        chat_id: String,
        /// Acknowledged message ID.
        message_id: String,
        /// Acknowledging user ID.
        user_id: String,
    },
    /// A chat was created elsewhere and should appear in the chat list.
    ChatCreated(ChatSummary),
}

/// Outbound signal emitted towards the real-time channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutboundSignal {
    /// Subscribe to a chat's room.
    JoinRoom {
        /// Target chat ID.
        chat_id: String,
    },
    /// Unsubscribe from a chat's room.
    LeaveRoom {
        /// Target chat ID.
        chat_id: String,
    },
    /// Acknowledge a message as read by the local user.
    MarkRead {
        /// Acknowledged message ID.
        message_id: String,
    },
}

/// Live-search state snapshot consumed by the rendering layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SearchSnapshot {
    /// Current raw term.
    pub term: String,
    /// Results for the latest settled term.
    pub results: Vec<UserProfile>,
    /// Whether a search call is pending or in flight.
    pub loading: bool,
    /// Error from the latest settled call, when it failed.
    pub error: Option<SyncError>,
}

/// Event emitted by the view runtime for the rendering layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ViewEvent {
    /// Chat list changed.
    ChatListUpdated {
        /// Current chat summaries in insertion order.
        chats: Vec<ChatSummary>,
    },
    /// The active chat's message list changed.
    TimelineUpdated {
        /// Chat the timeline belongs to.
        chat_id: String,
        /// Full ordered message list.
        messages: Vec<Message>,
    },
    /// Scroll adjustment to apply, issued after the UI reports a render.
    ScrollRequested {
        /// Adjustment for the rendering layer.
        action: ScrollAction,
    },
    /// Live-search state changed.
    SearchStateChanged(SearchSnapshot),
    /// Profile lookup resolved.
    ProfileLoaded {
        /// Resolved profile payload.
        profile: UserProfile,
    },
    /// Profile lookup failed; no profile view may be shown.
    ProfileLookupFailed {
        /// Requested user ID.
        user_id: String,
        /// Failure details.
        error: SyncError,
    },
    /// A history page load failed; already loaded pages are kept.
    LoadFailed {
        /// Target chat ID.
        chat_id: String,
        /// Page that failed to load.
        page: u32,
        /// Failure details.
        error: SyncError,
        /// Whether retrying the load may succeed.
        retryable: bool,
    },
    /// Unrecoverable runtime failure.
    FatalError {
        /// Failure details.
        error: SyncError,
        /// Indicates whether the embedder may retry by restarting the runtime.
        recoverable: bool,
    },
}
