//! Scripted smoke run: drives the view runtime against an in-memory backend
//! and prints every emitted view event as one JSON line.

mod logging;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use view_core::{
    ChatSummary, Message, MessagePage, OutboundSignal, RealtimeEvent, SyncError, UserProfile,
    ViewCommand, ViewportMetrics,
};
use view_runtime::{ChatApi, ConfigError, RealtimePort, RuntimeConfig, ViewRuntime};

const DEFAULT_LOCAL_USER: &str = "user-demo";
const SIMULATED_LATENCY_MS: u64 = 25;
const PAGE_SIZE: usize = 4;
const STEP_PAUSE_MS: u64 = 150;

/// In-memory stand-in for the remote REST backend.
struct InMemoryChatApi {
    chats: HashMap<String, ChatSummary>,
    history: HashMap<String, Vec<Message>>,
    profiles: Vec<UserProfile>,
}

impl InMemoryChatApi {
    fn seeded() -> Self {
        let mut history = HashMap::new();
        history.insert("c-general".to_owned(), seed_general_history());
        history.insert("c-product".to_owned(), seed_product_history());

        let mut chats = HashMap::new();
        for (chat_id, participants) in [
            ("c-general", vec![DEFAULT_LOCAL_USER, "user-mara", "user-devin"]),
            ("c-product", vec![DEFAULT_LOCAL_USER, "user-mara"]),
        ] {
            chats.insert(
                chat_id.to_owned(),
                ChatSummary {
                    chat_id: chat_id.to_owned(),
                    participant_ids: participants.into_iter().map(str::to_owned).collect(),
                    last_message: history
                        .get(chat_id)
                        .and_then(|messages| messages.last().cloned()),
                },
            );
        }

        Self {
            chats,
            history,
            profiles: vec![
                profile("user-mara", "Mara Voss"),
                profile("user-devin", "Devin Oduya"),
                profile("user-sasha", "Sasha Lind"),
            ],
        }
    }
}

#[async_trait]
impl ChatApi for InMemoryChatApi {
    async fn fetch_messages(
        &self,
        chat_id: &str,
        page: u32,
        _limit: u16,
    ) -> Result<MessagePage, SyncError> {
        tokio::time::sleep(Duration::from_millis(SIMULATED_LATENCY_MS)).await;
        let Some(all) = self.history.get(chat_id) else {
            return Err(SyncError::not_found(format!("chat {chat_id} has no history")));
        };

        // Page 1 is the newest slice; older pages walk backwards.
        let total_pages = all.len().div_ceil(PAGE_SIZE).max(1) as u32;
        if page == 0 || page > total_pages {
            return Err(SyncError::not_found(format!("page {page} out of range")));
        }
        let end = all.len() - (page as usize - 1) * PAGE_SIZE;
        let start = end.saturating_sub(PAGE_SIZE);
        Ok(MessagePage {
            messages: all[start..end].to_vec(),
            page,
            total_pages,
        })
    }

    async fn fetch_chat(&self, chat_id: &str) -> Result<ChatSummary, SyncError> {
        tokio::time::sleep(Duration::from_millis(SIMULATED_LATENCY_MS)).await;
        self.chats
            .get(chat_id)
            .cloned()
            .ok_or_else(|| SyncError::not_found(format!("no chat {chat_id}")))
    }

    async fn fetch_user(&self, user_id: &str) -> Result<UserProfile, SyncError> {
        tokio::time::sleep(Duration::from_millis(SIMULATED_LATENCY_MS)).await;
        self.profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned()
            .ok_or_else(|| SyncError::not_found(format!("no user {user_id}")))
    }

    async fn search_users(&self, term: &str) -> Result<Vec<UserProfile>, SyncError> {
        tokio::time::sleep(Duration::from_millis(SIMULATED_LATENCY_MS)).await;
        let needle = term.to_lowercase();
        Ok(self
            .profiles
            .iter()
            .filter(|p| p.display_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

/// Realtime port that just logs outbound signals.
struct LoggingRealtimePort;

#[async_trait]
impl RealtimePort for LoggingRealtimePort {
    async fn send(&self, signal: OutboundSignal) -> Result<(), SyncError> {
        info!(?signal, "realtime signal sent");
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    logging::init();

    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::MissingValue { .. }) => RuntimeConfig::new(DEFAULT_LOCAL_USER),
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(1);
        }
    };
    info!(local_user = %config.local_user_id, "starting smoke run");

    let api = Arc::new(InMemoryChatApi::seeded());
    let (realtime_tx, realtime_rx) = mpsc::channel(16);
    let handle = ViewRuntime::spawn(config, api, Arc::new(LoggingRealtimePort), realtime_rx);

    let mut events = handle.channels().subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!(error = %err, "event serialization failed"),
            }
        }
    });

    let commands = handle.channels();
    let steps = [
        ViewCommand::ActivateChat {
            chat_id: "c-general".to_owned(),
        },
        ViewCommand::MessagesRendered {
            metrics: viewport(400.0, 1_000.0),
        },
        // Near the top: triggers the older-page load.
        ViewCommand::ViewportScrolled {
            metrics: viewport(40.0, 1_000.0),
        },
        ViewCommand::MessagesRendered {
            metrics: viewport(40.0, 1_800.0),
        },
        ViewCommand::SearchInput {
            term: "ma".to_owned(),
        },
        ViewCommand::OpenProfile {
            user_id: "user-mara".to_owned(),
        },
        ViewCommand::ActivateChat {
            chat_id: "c-product".to_owned(),
        },
        ViewCommand::MessagesRendered {
            metrics: viewport(0.0, 600.0),
        },
    ];
    for command in steps {
        if let Err(err) = commands.send_command(command).await {
            eprintln!("command channel closed early: {err}");
            std::process::exit(1);
        }
        tokio::time::sleep(Duration::from_millis(STEP_PAUSE_MS)).await;
    }

    // A live push while c-product is active.
    let pushed = Message {
        id: "m-live-1".to_owned(),
        chat_id: "c-product".to_owned(),
        sender_id: "user-mara".to_owned(),
        content: "Profiling idle CPU now.".to_owned(),
        created_at_ms: 1_722_000_600_000,
        read_by: HashSet::new(),
    };
    if realtime_tx
        .send(RealtimeEvent::NewMessage(pushed))
        .await
        .is_err()
    {
        warn!("realtime channel closed before push");
    }
    tokio::time::sleep(Duration::from_millis(STEP_PAUSE_MS)).await;

    handle.shutdown();
    handle.join().await;
    let _ = printer.await;
    info!("smoke run complete");
}

fn viewport(scroll_top: f32, scroll_height: f32) -> ViewportMetrics {
    ViewportMetrics {
        scroll_top,
        scroll_height,
        viewport_height: 600.0,
    }
}

fn profile(user_id: &str, display_name: &str) -> UserProfile {
    UserProfile {
        user_id: user_id.to_owned(),
        display_name: display_name.to_owned(),
        avatar_url: None,
    }
}

fn seed_message(id: &str, chat_id: &str, sender_id: &str, content: &str, offset_s: u64) -> Message {
    Message {
        id: id.to_owned(),
        chat_id: chat_id.to_owned(),
        sender_id: sender_id.to_owned(),
        content: content.to_owned(),
        created_at_ms: 1_722_000_000_000 + offset_s * 1_000,
        read_by: HashSet::new(),
    }
}

fn seed_general_history() -> Vec<Message> {
    let lines = [
        ("user-mara", "Shipping the new hotkey flow now."),
        ("user-devin", "Latency on local echo is under 100ms."),
        ("user-sasha", "Search index warmed on startup."),
        (DEFAULT_LOCAL_USER, "Feels fast. Let's keep it lean."),
        ("user-mara", "Next up: attachments and previews."),
        ("user-devin", "Scroll restore is pixel-stable now."),
        ("user-sasha", "Receipts dedupe correctly across revisits."),
        (DEFAULT_LOCAL_USER, "Nice. Cutting a build tonight."),
        ("user-mara", "Pagination holds up under slow networks."),
        ("user-devin", "Debounce keeps search traffic tiny."),
        ("user-sasha", "Profile cache collapses duplicate fetches."),
        (DEFAULT_LOCAL_USER, "Demo script is ready."),
    ];
    lines
        .into_iter()
        .enumerate()
        .map(|(i, (sender, content))| {
            seed_message(&format!("g-{i}"), "c-general", sender, content, i as u64 * 60)
        })
        .collect()
}

fn seed_product_history() -> Vec<Message> {
    let lines = [
        ("user-mara", "Can you sanity-check the build flags?"),
        (DEFAULT_LOCAL_USER, "On it after lunch."),
        ("user-mara", "Thanks. Flamegraphs attached."),
    ];
    lines
        .into_iter()
        .enumerate()
        .map(|(i, (sender, content))| {
            seed_message(&format!("p-{i}"), "c-product", sender, content, i as u64 * 60)
        })
        .collect()
}
