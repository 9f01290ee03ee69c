use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use tasky_types::api::SendMessageRequest;
use tasky_types::{Message, User};

use crate::backend::Backend;
use crate::error::ClientError;

/// Visible phase of the chat view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// A visible refresh shows the loading phase and clears the error first; a
/// silent one does neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Visible,
    Silent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank text; nothing was sent.
    Skipped,
    /// The server echoed the message and it was appended.
    Appended(i64),
    /// No usable echo; the list was refreshed instead.
    Refreshed,
}

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub task_id: Option<i64>,
    pub phase: ChatPhase,
    /// Server order, with sent messages appended at the end.
    pub messages: Vec<Message>,
    pub error: Option<String>,
    pub sending: bool,
    pub last_updated: Option<DateTime<Utc>>,
    silent_in_flight: u32,
    generation: u64,
}

impl ChatState {
    pub fn is_loading(&self) -> bool {
        self.phase == ChatPhase::Loading
    }

    /// A silent refresh is in flight. Never reflected in `phase`.
    pub fn is_refreshing(&self) -> bool {
        self.silent_in_flight > 0
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn rebind(&mut self, task_id: Option<i64>) {
        *self = Self {
            task_id,
            generation: self.generation + 1,
            ..Self::default()
        };
    }

    fn begin_refresh(&mut self, mode: RefreshMode) {
        match mode {
            RefreshMode::Visible => {
                self.phase = ChatPhase::Loading;
                self.error = None;
            }
            RefreshMode::Silent => self.silent_in_flight += 1,
        }
    }

    fn finish_refresh(&mut self, mode: RefreshMode, result: Result<Vec<Message>, ClientError>) {
        if mode == RefreshMode::Silent {
            self.silent_in_flight = self.silent_in_flight.saturating_sub(1);
        }
        match result {
            Ok(messages) => {
                self.messages = messages;
                self.error = None;
                self.phase = ChatPhase::Ready;
                self.last_updated = Some(Utc::now());
            }
            Err(err) => {
                self.error = Some(err.to_string());
                self.phase = ChatPhase::Failed;
                // Silent failures keep the last good list.
                if mode == RefreshMode::Visible {
                    self.messages.clear();
                }
            }
        }
    }

    /// Appends a sent message unless a refresh already brought it in.
    fn append(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push(message);
        self.last_updated = Some(Utc::now());
        true
    }
}

#[derive(Debug)]
struct PollScope {
    task_id: i64,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Keeps a task's message list loosely in sync by polling, and sends
/// messages.
///
/// [`ChatSync::bind`] starts a poll scope: one visible fetch, then a silent
/// fetch every `refresh_interval`. Rebinding, [`ChatSync::unbind`] or
/// dropping the synchronizer ends the scope; results that land after that are
/// discarded by the generation check.
pub struct ChatSync<B: Backend> {
    backend: Arc<B>,
    refresh_interval: Duration,
    viewer: Option<User>,
    state: Arc<watch::Sender<ChatState>>,
    scope: Mutex<Option<PollScope>>,
}

impl<B: Backend> ChatSync<B> {
    pub fn new(backend: Arc<B>, refresh_interval: Duration, viewer: Option<User>) -> Self {
        let (state, _) = watch::channel(ChatState::default());
        Self {
            backend,
            refresh_interval,
            viewer,
            state: Arc::new(state),
            scope: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ChatState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    pub fn task_id(&self) -> Option<i64> {
        self.state.borrow().task_id
    }

    /// Starts polling `task_id`, tearing down any previous scope first.
    pub async fn bind(&self, task_id: i64) {
        self.unbind().await;

        let mut generation = 0;
        self.state.send_modify(|state| {
            state.rebind(Some(task_id));
            generation = state.generation;
        });

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.backend),
            Arc::clone(&self.state),
            task_id,
            generation,
            self.refresh_interval,
            stop_rx,
        ));

        info!("chat polling task {} every {:?}", task_id, self.refresh_interval);
        let mut slot = self.scope.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(PollScope {
            task_id,
            stop_tx: Some(stop_tx),
            task,
        });
    }

    /// Stops polling and waits for the loop to exit. No tick fires and no
    /// fetch result is applied afterwards.
    pub async fn unbind(&self) {
        let scope = self
            .scope
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        self.state.send_if_modified(|state| {
            if state.task_id.is_none() {
                return false;
            }
            state.rebind(None);
            true
        });

        if let Some(mut scope) = scope {
            if let Some(stop_tx) = scope.stop_tx.take() {
                let _ = stop_tx.send(());
            }
            if let Err(err) = (&mut scope.task).await {
                if !err.is_cancelled() {
                    warn!("chat poll loop for task {} ended abnormally: {}", scope.task_id, err);
                }
            }
            debug!("chat polling stopped for task {}", scope.task_id);
        }
    }

    /// Fetches the message list now, outside the tick schedule.
    pub async fn refresh(&self, mode: RefreshMode) {
        let (task_id, generation) = {
            let state = self.state.borrow();
            (state.task_id, state.generation)
        };
        if let Some(task_id) = task_id {
            refresh_messages(self.backend.as_ref(), &self.state, task_id, generation, mode).await;
        }
    }

    /// Sends `text` to the bound task.
    ///
    /// Blank text is a no-op. A server echo with an id is appended; anything
    /// else triggers a silent refresh. Failures are recorded in the state and
    /// returned.
    pub async fn send(&self, text: &str) -> Result<SendOutcome, ClientError> {
        let body = text.trim();
        if body.is_empty() {
            return Ok(SendOutcome::Skipped);
        }

        let (task_id, generation) = {
            let state = self.state.borrow();
            (state.task_id, state.generation)
        };
        let task_id =
            task_id.ok_or_else(|| ClientError::validation("chat is not bound to a task"))?;

        self.update_if_current(generation, |state| {
            state.sending = true;
            state.error = None;
        });

        let request = SendMessageRequest {
            body: body.to_owned(),
            sender_id: self.viewer.as_ref().map(|v| v.id),
        };

        match self.backend.send_message(task_id, &request).await {
            Ok(Some(message)) => {
                let id = message.id;
                self.update_if_current(generation, |state| {
                    state.sending = false;
                    if !state.append(message) {
                        debug!("message {} already present after refresh", id);
                    }
                });
                Ok(SendOutcome::Appended(id))
            }
            Ok(None) => {
                self.update_if_current(generation, |state| state.sending = false);
                refresh_messages(
                    self.backend.as_ref(),
                    &self.state,
                    task_id,
                    generation,
                    RefreshMode::Silent,
                )
                .await;
                Ok(SendOutcome::Refreshed)
            }
            Err(err) => {
                warn!("sending message to task {} failed: {}", task_id, err);
                let message = err.to_string();
                self.update_if_current(generation, |state| {
                    state.sending = false;
                    state.error = Some(message);
                });
                Err(err)
            }
        }
    }

    fn update_if_current<F>(&self, generation: u64, update: F)
    where
        F: FnOnce(&mut ChatState),
    {
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            update(state);
            true
        });
    }
}

impl<B: Backend> Drop for ChatSync<B> {
    fn drop(&mut self) {
        let slot = self.scope.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(scope) = slot.take() {
            scope.task.abort();
        }
    }
}

async fn poll_loop<B: Backend>(
    backend: Arc<B>,
    state: Arc<watch::Sender<ChatState>>,
    task_id: i64,
    generation: u64,
    period: Duration,
    stop_rx: oneshot::Receiver<()>,
) {
    let ticks = async {
        refresh_messages(backend.as_ref(), &state, task_id, generation, RefreshMode::Visible).await;

        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            refresh_messages(backend.as_ref(), &state, task_id, generation, RefreshMode::Silent)
                .await;
        }
    };

    // Dropping `ticks` also drops any fetch still in flight.
    tokio::select! {
        _ = stop_rx => {}
        _ = ticks => {}
    }
}

async fn refresh_messages<B: Backend>(
    backend: &B,
    state: &watch::Sender<ChatState>,
    task_id: i64,
    generation: u64,
    mode: RefreshMode,
) {
    let started = state.send_if_modified(|current| {
        if current.generation != generation {
            return false;
        }
        current.begin_refresh(mode);
        true
    });
    if !started {
        return;
    }

    let result = backend.list_messages(task_id).await;
    if let Err(err) = &result {
        warn!("{:?} chat refresh for task {} failed: {}", mode, task_id, err);
    }

    state.send_if_modified(|current| {
        if current.generation != generation {
            debug!("discarding stale message list for task {}", task_id);
            return false;
        }
        current.finish_refresh(mode, result);
        true
    });
}
