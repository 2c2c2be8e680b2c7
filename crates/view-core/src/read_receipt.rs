use std::collections::HashSet;

use tracing::trace;

use crate::types::Message;

/// Per-visit deduplicated read-acknowledgment emitter.
///
/// Tracks which message IDs have already been acknowledged during the current
/// visit to a chat. The set is cleared on every chat switch; the remote side
/// is assumed idempotent to repeated acknowledgments, so re-sends after a
/// revisit are harmless.
#[derive(Debug, Default)]
pub struct ReadReceiptTracker {
    processed: HashSet<String>,
}

impl ReadReceiptTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the processed set. Called whenever the active chat changes.
    pub fn reset(&mut self) {
        self.processed.clear();
    }

    /// Whether `message_id` was already acknowledged during this visit.
    pub fn is_processed(&self, message_id: &str) -> bool {
        self.processed.contains(message_id)
    }

    /// Collect message IDs that need a read acknowledgment.
    ///
    /// A message qualifies when it was authored by someone else, the local
    /// user is not in its `read_by` set, and it has not been acknowledged
    /// during this visit. Each returned ID is recorded so recomputation emits
    /// it at most once.
    pub fn collect_unread(&mut self, messages: &[Message], local_user_id: &str) -> Vec<String> {
        let mut unread = Vec::new();
        for message in messages {
            if message.sender_id == local_user_id
                || message.is_read_by(local_user_id)
                || self.processed.contains(&message.id)
            {
                continue;
            }
            self.processed.insert(message.id.clone());
            unread.push(message.id.clone());
        }
        if !unread.is_empty() {
            trace!(count = unread.len(), "unread messages collected for acknowledgment");
        }
        unread
    }
}
