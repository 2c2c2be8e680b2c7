//! Single-task driver wiring the view-sync engines to remote collaborators.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use view_core::{
    ChatStore, ChatSummary, FetchRequest, MessagePage, OutboundSignal, PaginationEngine,
    ProfileCache, ProfileLookup, ReadReceiptTracker, RealtimeEvent, RetryPolicy,
    ScrollCoordinator, SearchEngine, SessionController, SessionEffect, SyncError,
    SyncErrorCategory, UserProfile, ViewChannels, ViewCommand, ViewEvent, ViewportMetrics,
};

use crate::api::{ChatApi, RealtimePort};
use crate::config::RuntimeConfig;

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 128;
const COMPLETION_BUFFER: usize = 64;
const RETRY_BASE_DELAY_MS: u64 = 500;
const RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Completed asynchronous work, tagged with the key it was requested for.
///
/// Keys are re-checked against current state by the owning engine before any
/// mutation, so completions arriving out of order are dropped rather than
/// applied.
#[derive(Debug)]
enum Completion {
    PageLoaded {
        chat_id: String,
        page: u32,
        initial: bool,
        attempt: u32,
        result: Result<MessagePage, SyncError>,
    },
    MetadataLoaded {
        chat_id: String,
        result: Result<ChatSummary, SyncError>,
    },
    ProfileResolved {
        user_id: String,
        result: Result<UserProfile, SyncError>,
    },
    SearchResolved {
        generation: u64,
        result: Result<Vec<UserProfile>, SyncError>,
    },
}

/// Handle returned by [`ViewRuntime::spawn`].
#[derive(Debug)]
pub struct RuntimeHandle {
    channels: ViewChannels,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl RuntimeHandle {
    /// Command/event channels for the rendering layer.
    pub fn channels(&self) -> &ViewChannels {
        &self.channels
    }

    /// Request cooperative shutdown of the runtime loop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the runtime loop to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// The view-sync driver.
///
/// All engine state lives on one task; asynchronous work (fetches, the
/// debounce timer, realtime deliveries) resumes as discrete units through the
/// `select!` loop, so entry points never race while completions may still
/// arrive out of order relative to newer state.
pub struct ViewRuntime {
    epoch: Instant,
    channels: ViewChannels,
    api: Arc<dyn ChatApi>,
    realtime: Arc<dyn RealtimePort>,
    completion_tx: mpsc::Sender<Completion>,
    store: ChatStore,
    pagination: PaginationEngine,
    scroll: ScrollCoordinator,
    receipts: ReadReceiptTracker,
    search: SearchEngine,
    profile: ProfileCache,
    session: SessionController,
    retry: RetryPolicy,
}

impl ViewRuntime {
    /// Start the runtime loop and return its handle.
    ///
    /// `realtime_rx` delivers inbound channel events; outbound signals go
    /// through `realtime`.
    pub fn spawn(
        config: RuntimeConfig,
        api: Arc<dyn ChatApi>,
        realtime: Arc<dyn RealtimePort>,
        realtime_rx: mpsc::Receiver<RealtimeEvent>,
    ) -> RuntimeHandle {
        let (channels, command_rx) = ViewChannels::new(COMMAND_BUFFER, EVENT_BUFFER);
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_BUFFER);
        let shutdown = CancellationToken::new();

        debug!(
            local_user = %config.local_user_id,
            page_limit = config.page_limit,
            debounce_ms = config.search_debounce_ms,
            "spawning view runtime"
        );

        let runtime = Self {
            epoch: Instant::now(),
            channels: channels.clone(),
            api,
            realtime,
            completion_tx,
            store: ChatStore::new(),
            pagination: PaginationEngine::new(config.page_limit),
            scroll: ScrollCoordinator::new(),
            receipts: ReadReceiptTracker::new(),
            search: SearchEngine::new(config.search_debounce_ms, config.search_min_len),
            profile: ProfileCache::new(),
            session: SessionController::new(config.local_user_id),
            retry: RetryPolicy::new(
                RETRY_BASE_DELAY_MS,
                RETRY_MAX_DELAY_MS,
                config.fetch_retry_limit,
            ),
        };

        let stop = shutdown.child_token();
        let task = tokio::spawn(runtime.run(command_rx, realtime_rx, completion_rx, stop));

        RuntimeHandle {
            channels,
            shutdown,
            task,
        }
    }

    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<ViewCommand>,
        mut realtime_rx: mpsc::Receiver<RealtimeEvent>,
        mut completion_rx: mpsc::Receiver<Completion>,
        stop: CancellationToken,
    ) {
        debug!("view runtime loop started");
        let mut realtime_open = true;

        loop {
            let deadline = self.search.next_deadline_ms();
            tokio::select! {
                _ = stop.cancelled() => break,
                command = command_rx.recv() => match command {
                    Some(ViewCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                event = realtime_rx.recv(), if realtime_open => match event {
                    Some(event) => self.handle_realtime(event),
                    None => {
                        warn!("realtime stream closed");
                        realtime_open = false;
                    }
                },
                Some(completion) = completion_rx.recv() => {
                    self.handle_completion(completion);
                }
                _ = Self::sleep_until(self.epoch, deadline) => self.fire_search(),
            }
        }

        debug!("view runtime loop exiting");
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    async fn sleep_until(epoch: Instant, deadline_ms: Option<u64>) {
        match deadline_ms {
            Some(deadline) => {
                tokio::time::sleep_until(epoch + Duration::from_millis(deadline)).await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    async fn handle_command(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::ActivateChat { chat_id } => self.activate_chat(chat_id).await,
            ViewCommand::ViewportScrolled { metrics } => self.viewport_scrolled(metrics),
            ViewCommand::MessagesRendered { metrics } => self.messages_rendered(metrics).await,
            ViewCommand::SearchInput { term } => {
                self.search.set_term(term, self.now_ms());
                self.emit_search_state();
            }
            ViewCommand::SearchReset => {
                self.search.reset();
                self.emit_search_state();
            }
            ViewCommand::OpenProfile { user_id } => self.open_profile(user_id),
            ViewCommand::CloseProfile => trace!("profile view closed"),
            // Handled before dispatch.
            ViewCommand::Shutdown => {}
        }
    }

    async fn activate_chat(&mut self, chat_id: String) {
        let effects = self.session.activate(
            &chat_id,
            &mut self.store,
            &mut self.pagination,
            &mut self.scroll,
            &mut self.receipts,
        );
        if effects.is_empty() {
            return;
        }

        for effect in effects {
            match effect {
                SessionEffect::LeaveRoom { chat_id } => {
                    self.send_signal(OutboundSignal::LeaveRoom { chat_id }).await;
                }
                SessionEffect::JoinRoom { chat_id } => {
                    self.send_signal(OutboundSignal::JoinRoom { chat_id }).await;
                }
                SessionEffect::FetchMetadata { chat_id } => self.spawn_metadata_fetch(chat_id),
                SessionEffect::FetchInitialPage(request) => {
                    self.spawn_page_fetch(request, true, 0);
                }
            }
        }
        self.emit_timeline(&chat_id);
    }

    fn viewport_scrolled(&mut self, metrics: ViewportMetrics) {
        let Some(chat_id) = self.session.active_chat_id().map(str::to_owned) else {
            return;
        };
        let has_more = self.pagination.has_more(&chat_id);
        let in_flight = self.pagination.is_in_flight(&chat_id);
        if self.scroll.on_scroll(metrics, has_more, in_flight) {
            match self.pagination.begin_load_more(&chat_id) {
                Some(request) => self.spawn_page_fetch(request, false, 0),
                None => self.scroll.abort_older_load(),
            }
        }
    }

    async fn messages_rendered(&mut self, metrics: ViewportMetrics) {
        let Some(chat_id) = self.session.active_chat_id().map(str::to_owned) else {
            return;
        };

        let action = self.scroll.on_rendered(
            metrics,
            self.store.messages(&chat_id),
            self.session.local_user_id(),
        );
        self.channels.emit(ViewEvent::ScrollRequested { action });

        let unread = self
            .receipts
            .collect_unread(self.store.messages(&chat_id), self.session.local_user_id());
        for message_id in unread {
            self.send_signal(OutboundSignal::MarkRead { message_id }).await;
        }
    }

    fn open_profile(&mut self, user_id: String) {
        match self.profile.get(&user_id) {
            ProfileLookup::Hit(profile) => {
                self.channels.emit(ViewEvent::ProfileLoaded { profile });
            }
            ProfileLookup::InFlight => trace!(user_id = %user_id, "joining in-flight profile fetch"),
            ProfileLookup::Fetch => {
                let api = Arc::clone(&self.api);
                let tx = self.completion_tx.clone();
                let request_id = Uuid::new_v4();
                debug!(%request_id, user_id = %user_id, "profile fetch issued");
                tokio::spawn(async move {
                    let result = api.fetch_user(&user_id).await;
                    let _ = tx
                        .send(Completion::ProfileResolved { user_id, result })
                        .await;
                });
            }
        }
    }

    fn fire_search(&mut self) {
        let Some(request) = self.search.poll(self.now_ms()) else {
            return;
        };
        let api = Arc::clone(&self.api);
        let tx = self.completion_tx.clone();
        let request_id = Uuid::new_v4();
        debug!(%request_id, term = %request.term, generation = request.generation, "search issued");
        tokio::spawn(async move {
            let result = api.search_users(&request.term).await;
            let _ = tx
                .send(Completion::SearchResolved {
                    generation: request.generation,
                    result,
                })
                .await;
        });
    }

    fn spawn_page_fetch(&self, request: FetchRequest, initial: bool, attempt: u32) {
        let api = Arc::clone(&self.api);
        let tx = self.completion_tx.clone();
        let request_id = Uuid::new_v4();
        debug!(
            %request_id,
            chat_id = %request.chat_id,
            page = request.page,
            attempt,
            "history fetch issued"
        );
        tokio::spawn(async move {
            let result = api
                .fetch_messages(&request.chat_id, request.page, request.limit)
                .await;
            let _ = tx
                .send(Completion::PageLoaded {
                    chat_id: request.chat_id,
                    page: request.page,
                    initial,
                    attempt,
                    result,
                })
                .await;
        });
    }

    fn spawn_metadata_fetch(&self, chat_id: String) {
        let api = Arc::clone(&self.api);
        let tx = self.completion_tx.clone();
        let request_id = Uuid::new_v4();
        debug!(%request_id, chat_id = %chat_id, "chat metadata fetch issued");
        tokio::spawn(async move {
            let result = api.fetch_chat(&chat_id).await;
            let _ = tx
                .send(Completion::MetadataLoaded { chat_id, result })
                .await;
        });
    }

    async fn send_signal(&self, signal: OutboundSignal) {
        if let Err(error) = self.realtime.send(signal.clone()).await {
            warn!(?signal, error = %error, "realtime signal failed");
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::PageLoaded {
                chat_id,
                page,
                initial,
                attempt,
                result,
            } => match result {
                Ok(message_page) => {
                    let applied = self
                        .pagination
                        .apply_page(&mut self.store, &chat_id, message_page);
                    if applied && self.session.active_chat_id() == Some(chat_id.as_str()) {
                        self.emit_timeline(&chat_id);
                    }
                }
                Err(error) => self.page_load_failed(chat_id, page, initial, attempt, error),
            },
            Completion::MetadataLoaded { chat_id, result } => match result {
                Ok(chat) => {
                    self.session.on_chat_created(&mut self.store, chat);
                    self.emit_chat_list();
                }
                Err(error) => {
                    warn!(chat_id = %chat_id, error = %error, "chat metadata fetch failed");
                    if error.category == SyncErrorCategory::Unauthorized {
                        self.channels.emit(ViewEvent::FatalError {
                            error,
                            recoverable: false,
                        });
                    }
                }
            },
            Completion::ProfileResolved { user_id, result } => match result {
                Ok(profile) => {
                    if self.profile.apply_success(&user_id, profile.clone()) {
                        self.channels.emit(ViewEvent::ProfileLoaded { profile });
                    }
                }
                Err(error) => {
                    if self.profile.apply_failure(&user_id) {
                        self.channels
                            .emit(ViewEvent::ProfileLookupFailed { user_id, error });
                    }
                }
            },
            Completion::SearchResolved { generation, result } => {
                let applied = match result {
                    Ok(results) => self.search.apply_success(generation, results),
                    Err(error) => self.search.apply_failure(generation, error),
                };
                if applied {
                    self.emit_search_state();
                }
            }
        }
    }

    fn page_load_failed(
        &mut self,
        chat_id: String,
        page: u32,
        initial: bool,
        attempt: u32,
        error: SyncError,
    ) {
        // Only the initial page is retried automatically; a failed "load
        // more" reopens on the next scroll trigger instead.
        if initial && let Some(delay) = self.retry.delay_for(attempt, &error) {
            warn!(
                chat_id = %chat_id,
                page,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "initial history load failed; retrying"
            );
            let request = FetchRequest {
                chat_id,
                page,
                limit: self.pagination.limit(),
            };
            let api = Arc::clone(&self.api);
            let tx = self.completion_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let result = api
                    .fetch_messages(&request.chat_id, request.page, request.limit)
                    .await;
                let _ = tx
                    .send(Completion::PageLoaded {
                        chat_id: request.chat_id,
                        page: request.page,
                        initial: true,
                        attempt: attempt + 1,
                        result,
                    })
                    .await;
            });
            return;
        }

        self.pagination.fail_load(&chat_id, &error);
        if self.session.active_chat_id() == Some(chat_id.as_str()) {
            self.scroll.abort_older_load();
        }
        if error.category == SyncErrorCategory::Unauthorized {
            self.channels.emit(ViewEvent::FatalError {
                error: error.clone(),
                recoverable: false,
            });
        }
        let retryable = error.is_retryable();
        self.channels.emit(ViewEvent::LoadFailed {
            chat_id,
            page,
            error,
            retryable,
        });
    }

    fn handle_realtime(&mut self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::NewMessage(message) => {
                let chat_id = message.chat_id.clone();
                let active_changed = self.session.on_new_message(&mut self.store, message);
                self.emit_chat_list();
                if active_changed {
                    self.emit_timeline(&chat_id);
                }
            }
            RealtimeEvent::MessageRead {
                chat_id,
                message_id,
                user_id,
            } => {
                if self
                    .session
                    .on_message_read(&mut self.store, &chat_id, &message_id, &user_id)
                {
                    self.emit_timeline(&chat_id);
                }
            }
            RealtimeEvent::ChatCreated(chat) => {
                self.session.on_chat_created(&mut self.store, chat);
                self.emit_chat_list();
            }
        }
    }

    fn emit_timeline(&self, chat_id: &str) {
        self.channels.emit(ViewEvent::TimelineUpdated {
            chat_id: chat_id.to_owned(),
            messages: self.store.messages(chat_id).to_vec(),
        });
    }

    fn emit_chat_list(&self) {
        self.channels.emit(ViewEvent::ChatListUpdated {
            chats: self.store.list_chats().to_vec(),
        });
    }

    fn emit_search_state(&self) {
        self.channels
            .emit(ViewEvent::SearchStateChanged(self.search.snapshot()));
    }
}
