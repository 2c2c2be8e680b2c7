use async_trait::async_trait;
use view_core::{ChatSummary, MessagePage, OutboundSignal, SyncError, UserProfile};

/// Remote REST collaborators consumed by the view runtime.
///
/// Implementations are transport-specific; the runtime only relies on the
/// result shapes and on errors being classified via
/// [`view_core::SyncErrorCategory`].
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Fetch one page of message history for a chat.
    async fn fetch_messages(
        &self,
        chat_id: &str,
        page: u32,
        limit: u16,
    ) -> Result<MessagePage, SyncError>;

    /// Fetch metadata for a single chat.
    async fn fetch_chat(&self, chat_id: &str) -> Result<ChatSummary, SyncError>;

    /// Fetch a user's public profile.
    async fn fetch_user(&self, user_id: &str) -> Result<UserProfile, SyncError>;

    /// Search user profiles by term.
    async fn search_users(&self, term: &str) -> Result<Vec<UserProfile>, SyncError>;
}

/// Outbound side of the real-time channel.
///
/// Inbound events are delivered to the runtime through an
/// `mpsc::Receiver<RealtimeEvent>`; delivery reliability is the transport's
/// concern.
#[async_trait]
pub trait RealtimePort: Send + Sync {
    /// Send one signal to the channel.
    async fn send(&self, signal: OutboundSignal) -> Result<(), SyncError>;
}
