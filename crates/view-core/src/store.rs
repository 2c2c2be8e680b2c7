use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::types::{ChatSummary, Message};

/// Single owner of shared chat view state.
///
/// Every mutation goes through a named entry point; engines receive the store
/// by reference and nothing else writes to it. Message lists are kept sorted
/// ascending by `created_at_ms` with unique IDs at all times.
#[derive(Debug, Default, Clone)]
pub struct ChatStore {
    chats: Vec<ChatSummary>,
    messages: HashMap<String, Vec<Message>>,
    active_chat_id: Option<String>,
}

impl ChatStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chat summaries in insertion order.
    pub fn list_chats(&self) -> &[ChatSummary] {
        &self.chats
    }

    /// Whether metadata for `chat_id` is present.
    pub fn contains_chat(&self, chat_id: &str) -> bool {
        self.chats.iter().any(|chat| chat.chat_id == chat_id)
    }

    /// Insert or replace chat metadata.
    pub fn upsert_chat(&mut self, chat: ChatSummary) {
        match self
            .chats
            .iter_mut()
            .find(|existing| existing.chat_id == chat.chat_id)
        {
            Some(existing) => *existing = chat,
            None => {
                debug!(chat_id = %chat.chat_id, "chat added to store");
                self.chats.push(chat);
            }
        }
    }

    /// Currently active chat ID.
    pub fn active_chat_id(&self) -> Option<&str> {
        self.active_chat_id.as_deref()
    }

    /// Set or clear the active chat.
    pub fn set_active_chat(&mut self, chat_id: Option<String>) {
        self.active_chat_id = chat_id;
    }

    /// Ordered message list for `chat_id`; empty when nothing is loaded.
    pub fn messages(&self, chat_id: &str) -> &[Message] {
        self.messages
            .get(chat_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `chat_id` has a non-empty loaded message list.
    pub fn has_messages(&self, chat_id: &str) -> bool {
        self.messages
            .get(chat_id)
            .is_some_and(|list| !list.is_empty())
    }

    /// Insert one message in timestamp order.
    ///
    /// A message whose ID is already present is ignored. Returns whether the
    /// message was inserted. Chat `last_message` metadata is refreshed when
    /// the inserted message is the newest one.
    pub fn insert_message(&mut self, message: Message) -> bool {
        let list = self.messages.entry(message.chat_id.clone()).or_default();
        if list.iter().any(|existing| existing.id == message.id) {
            trace!(message_id = %message.id, "duplicate message ignored");
            return false;
        }

        let position = list
            .iter()
            .position(|existing| existing.created_at_ms > message.created_at_ms)
            .unwrap_or(list.len());
        let is_newest = position == list.len();
        list.insert(position, message.clone());

        if is_newest
            && let Some(chat) = self
                .chats
                .iter_mut()
                .find(|chat| chat.chat_id == message.chat_id)
        {
            chat.last_message = Some(message);
        }
        true
    }

    /// Merge an older history page into the front of a chat's message list.
    ///
    /// Incoming messages already present (by ID) or belonging to another chat
    /// are dropped; the existing suffix is never reordered.
    pub fn merge_older_page(&mut self, chat_id: &str, incoming: Vec<Message>) {
        let list = self.messages.entry(chat_id.to_owned()).or_default();
        let existing_ids: HashSet<&str> = list.iter().map(|m| m.id.as_str()).collect();

        let mut fresh: Vec<Message> = incoming
            .into_iter()
            .filter(|m| m.chat_id == chat_id && !existing_ids.contains(m.id.as_str()))
            .collect();
        if fresh.is_empty() {
            return;
        }
        fresh.sort_by_key(|m| m.created_at_ms);
        trace!(
            chat_id = %chat_id,
            merged = fresh.len(),
            "older page merged into timeline"
        );

        fresh.append(list);
        *list = fresh;
        list.sort_by_key(|m| m.created_at_ms);
    }

    /// Record that `user_id` read `message_id` in `chat_id`.
    pub fn apply_read_receipt(&mut self, chat_id: &str, message_id: &str, user_id: &str) -> bool {
        let Some(list) = self.messages.get_mut(chat_id) else {
            return false;
        };
        let Some(message) = list.iter_mut().find(|m| m.id == message_id) else {
            return false;
        };
        message.read_by.insert(user_id.to_owned())
    }

    /// Drop every loaded message for `chat_id`.
    pub fn clear_messages(&mut self, chat_id: &str) {
        self.messages.remove(chat_id);
    }
}
