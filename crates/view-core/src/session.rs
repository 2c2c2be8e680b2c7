use tracing::{debug, trace};

use crate::pagination::PaginationEngine;
use crate::read_receipt::ReadReceiptTracker;
use crate::scroll::ScrollCoordinator;
use crate::store::ChatStore;
use crate::types::{ChatSummary, FetchRequest, Message};

/// Side effect the runtime must perform after an active-chat transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Leave the previous chat's real-time room.
    LeaveRoom {
        /// Chat whose room to leave.
        chat_id: String,
    },
    /// Join the target chat's real-time room.
    JoinRoom {
        /// Chat whose room to join.
        chat_id: String,
    },
    /// Fetch chat metadata missing from the local collection.
    FetchMetadata {
        /// Chat whose metadata to fetch.
        chat_id: String,
    },
    /// Issue the initial history page fetch.
    FetchInitialPage(FetchRequest),
}

/// Top-level orchestrator owning the active-chat transition.
///
/// Wires the shared store, pagination, scroll, and read-receipt engines
/// together per active chat. Documented reset points for the per-visit
/// scratch state are [`SessionController::activate`] (chat switch) and
/// [`SessionController::deactivate`] (logout).
#[derive(Debug)]
pub struct SessionController {
    local_user_id: String,
    active_chat_id: Option<String>,
}

impl SessionController {
    /// Create a controller for the local user.
    pub fn new(local_user_id: impl Into<String>) -> Self {
        Self {
            local_user_id: local_user_id.into(),
            active_chat_id: None,
        }
    }

    /// Local user ID.
    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    /// Currently active chat, when one is selected.
    pub fn active_chat_id(&self) -> Option<&str> {
        self.active_chat_id.as_deref()
    }

    /// Transition the active chat to `chat_id`.
    ///
    /// A no-op when `chat_id` is already active. Otherwise leaves the
    /// previous room, clears the per-visit scratch state, joins the target
    /// room, fetches missing metadata, and either reuses already loaded
    /// history (next render jumps to the bottom without a network call) or
    /// issues the initial page fetch.
    pub fn activate(
        &mut self,
        chat_id: &str,
        store: &mut ChatStore,
        pagination: &mut PaginationEngine,
        scroll: &mut ScrollCoordinator,
        receipts: &mut ReadReceiptTracker,
    ) -> Vec<SessionEffect> {
        if self.active_chat_id.as_deref() == Some(chat_id) {
            trace!(chat_id = %chat_id, "chat already active");
            return Vec::new();
        }

        let mut effects = Vec::new();
        if let Some(previous) = self.active_chat_id.take() {
            effects.push(SessionEffect::LeaveRoom { chat_id: previous });
        }

        receipts.reset();
        scroll.reset();
        store.set_active_chat(Some(chat_id.to_owned()));

        if !store.contains_chat(chat_id) {
            effects.push(SessionEffect::FetchMetadata {
                chat_id: chat_id.to_owned(),
            });
        }
        effects.push(SessionEffect::JoinRoom {
            chat_id: chat_id.to_owned(),
        });

        if store.has_messages(chat_id) {
            // History is already loaded; the next render lands at the bottom
            // without touching the network.
            scroll.mark_initial_load();
        } else if let Some(request) = pagination.begin_initial_load(chat_id) {
            effects.push(SessionEffect::FetchInitialPage(request));
        }

        debug!(chat_id = %chat_id, "chat activated");
        self.active_chat_id = Some(chat_id.to_owned());
        effects
    }

    /// Clear the active chat and per-visit scratch state (logout reset point).
    pub fn deactivate(
        &mut self,
        store: &mut ChatStore,
        scroll: &mut ScrollCoordinator,
        receipts: &mut ReadReceiptTracker,
    ) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        if let Some(previous) = self.active_chat_id.take() {
            effects.push(SessionEffect::LeaveRoom { chat_id: previous });
        }
        receipts.reset();
        scroll.reset();
        store.set_active_chat(None);
        effects
    }

    /// Store a pushed message. Returns whether the active chat's timeline
    /// changed.
    pub fn on_new_message(&self, store: &mut ChatStore, message: Message) -> bool {
        let chat_id = message.chat_id.clone();
        let inserted = store.insert_message(message);
        inserted && self.active_chat_id.as_deref() == Some(chat_id.as_str())
    }

    /// Record a remote read receipt. Returns whether the active chat's
    /// timeline changed.
    pub fn on_message_read(
        &self,
        store: &mut ChatStore,
        chat_id: &str,
        message_id: &str,
        user_id: &str,
    ) -> bool {
        let applied = store.apply_read_receipt(chat_id, message_id, user_id);
        applied && self.active_chat_id.as_deref() == Some(chat_id)
    }

    /// Add or refresh chat metadata from a "chat created" event or a
    /// metadata fetch.
    pub fn on_chat_created(&self, store: &mut ChatStore, chat: ChatSummary) {
        store.upsert_chat(chat);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::scroll::ScrollPhase;
    use crate::types::MessagePage;

    fn message(id: &str, chat_id: &str, sender_id: &str, created_at_ms: u64) -> Message {
        Message {
            id: id.to_owned(),
            chat_id: chat_id.to_owned(),
            sender_id: sender_id.to_owned(),
            content: String::new(),
            created_at_ms,
            read_by: HashSet::new(),
        }
    }

    fn chat(chat_id: &str) -> ChatSummary {
        ChatSummary {
            chat_id: chat_id.to_owned(),
            participant_ids: vec!["user-a".to_owned(), "user-b".to_owned()],
            last_message: None,
        }
    }

    struct Rig {
        session: SessionController,
        store: ChatStore,
        pagination: PaginationEngine,
        scroll: ScrollCoordinator,
        receipts: ReadReceiptTracker,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                session: SessionController::new("user-a"),
                store: ChatStore::new(),
                pagination: PaginationEngine::new(50),
                scroll: ScrollCoordinator::new(),
                receipts: ReadReceiptTracker::new(),
            }
        }

        fn activate(&mut self, chat_id: &str) -> Vec<SessionEffect> {
            self.session.activate(
                chat_id,
                &mut self.store,
                &mut self.pagination,
                &mut self.scroll,
                &mut self.receipts,
            )
        }
    }

    #[test]
    fn activating_the_active_chat_is_a_no_op() {
        let mut rig = Rig::new();
        rig.store.upsert_chat(chat("c1"));
        let first = rig.activate("c1");
        assert!(!first.is_empty());

        let second = rig.activate("c1");
        assert!(second.is_empty());
    }

    #[test]
    fn first_activation_fetches_metadata_and_initial_page() {
        let mut rig = Rig::new();
        let effects = rig.activate("c1");

        assert_eq!(
            effects,
            vec![
                SessionEffect::FetchMetadata {
                    chat_id: "c1".to_owned()
                },
                SessionEffect::JoinRoom {
                    chat_id: "c1".to_owned()
                },
                SessionEffect::FetchInitialPage(FetchRequest {
                    chat_id: "c1".to_owned(),
                    page: 1,
                    limit: 50,
                }),
            ]
        );
        assert_eq!(rig.scroll.phase(), ScrollPhase::InitialLoading);
    }

    #[test]
    fn switching_chats_leaves_previous_room() {
        let mut rig = Rig::new();
        rig.store.upsert_chat(chat("c1"));
        rig.store.upsert_chat(chat("c2"));
        rig.activate("c1");

        let effects = rig.activate("c2");
        assert_eq!(
            effects[0],
            SessionEffect::LeaveRoom {
                chat_id: "c1".to_owned()
            }
        );
        assert!(effects.contains(&SessionEffect::JoinRoom {
            chat_id: "c2".to_owned()
        }));
        assert_eq!(rig.session.active_chat_id(), Some("c2"));
    }

    #[test]
    fn loaded_history_is_reused_without_a_fetch() {
        let mut rig = Rig::new();
        rig.store.upsert_chat(chat("c1"));
        rig.store.upsert_chat(chat("c2"));
        rig.activate("c1");
        rig.pagination.apply_page(
            &mut rig.store,
            "c1",
            MessagePage {
                messages: vec![message("m1", "c1", "user-b", 100)],
                page: 1,
                total_pages: 1,
            },
        );

        rig.activate("c2");
        let effects = rig.activate("c1");
        assert!(
            !effects
                .iter()
                .any(|e| matches!(e, SessionEffect::FetchInitialPage(_))),
            "cached history must not refetch"
        );
        // The next render still jumps to the bottom.
        assert_eq!(rig.scroll.phase(), ScrollPhase::InitialLoading);
    }

    #[test]
    fn processed_read_set_is_scoped_to_the_visit() {
        let mut rig = Rig::new();
        rig.store.upsert_chat(chat("c1"));
        rig.store.upsert_chat(chat("c2"));

        rig.activate("c1");
        rig.store.insert_message(message("c1-m1", "c1", "user-b", 100));
        let acked = rig
            .receipts
            .collect_unread(rig.store.messages("c1"), "user-a");
        assert_eq!(acked, vec!["c1-m1".to_owned()]);

        rig.activate("c2");
        assert!(
            !rig.receipts.is_processed("c1-m1"),
            "switching chats must clear the processed set"
        );

        rig.store.insert_message(message("c2-m1", "c2", "user-b", 100));
        let acked = rig
            .receipts
            .collect_unread(rig.store.messages("c2"), "user-a");
        assert_eq!(acked, vec!["c2-m1".to_owned()]);
    }

    #[test]
    fn pushed_messages_only_surface_for_the_active_chat() {
        let mut rig = Rig::new();
        rig.store.upsert_chat(chat("c1"));
        rig.store.upsert_chat(chat("c2"));
        rig.activate("c1");

        assert!(
            rig.session
                .on_new_message(&mut rig.store, message("m1", "c1", "user-b", 100))
        );
        assert!(
            !rig.session
                .on_new_message(&mut rig.store, message("m2", "c2", "user-b", 100))
        );
        // The inactive chat still stored the message.
        assert_eq!(rig.store.messages("c2").len(), 1);

        // A duplicate push changes nothing.
        assert!(
            !rig.session
                .on_new_message(&mut rig.store, message("m1", "c1", "user-b", 100))
        );
    }

    #[test]
    fn read_receipts_route_like_messages() {
        let mut rig = Rig::new();
        rig.store.upsert_chat(chat("c1"));
        rig.activate("c1");
        rig.store.insert_message(message("m1", "c1", "user-a", 100));

        assert!(
            rig.session
                .on_message_read(&mut rig.store, "c1", "m1", "user-b")
        );
        assert!(
            !rig.session
                .on_message_read(&mut rig.store, "c1", "m1", "user-b")
        );
        assert!(
            !rig.session
                .on_message_read(&mut rig.store, "c9", "m1", "user-b")
        );
    }

    #[test]
    fn deactivate_clears_active_state() {
        let mut rig = Rig::new();
        rig.store.upsert_chat(chat("c1"));
        rig.activate("c1");

        let effects = rig.session.deactivate(
            &mut rig.store,
            &mut rig.scroll,
            &mut rig.receipts,
        );
        assert_eq!(
            effects,
            vec![SessionEffect::LeaveRoom {
                chat_id: "c1".to_owned()
            }]
        );
        assert_eq!(rig.session.active_chat_id(), None);
        assert_eq!(rig.store.active_chat_id(), None);
    }
}
