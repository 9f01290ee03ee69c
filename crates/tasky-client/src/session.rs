use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tasky_types::{Deal, Task, User};

use crate::backend::Backend;
use crate::permissions::{DerivedSession, derive};

/// Progress of the deal lookup for the bound task.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DealLookup {
    /// No task bound.
    #[default]
    Idle,
    Loading,
    /// `None` when the backend has no deal for the task yet.
    Resolved(Option<Deal>),
    /// Kept until the task id changes.
    Failed(String),
}

impl DealLookup {
    pub fn deal(&self) -> Option<&Deal> {
        match self {
            Self::Resolved(deal) => deal.as_ref(),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Inputs of a task-viewing session plus the lookup state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub task: Option<Task>,
    pub viewer: Option<User>,
    pub deal: DealLookup,
    generation: u64,
}

impl SessionState {
    pub fn task_id(&self) -> Option<i64> {
        self.task.as_ref().map(|t| t.id)
    }

    /// Bumped every time the bound task id changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn derived(&self) -> DerivedSession {
        derive(self.task.as_ref(), self.deal.deal(), self.viewer.as_ref())
    }
}

/// Resolves what a viewer may do on a task and keeps it current as the task,
/// its deal, or the viewer change.
///
/// Binding a new task id dispatches one deal lookup. Results are applied only
/// if the task id has not changed since dispatch; older lookups run to
/// completion and are discarded. Dropping the session aborts the latest
/// lookup.
pub struct TaskSession<B: Backend> {
    backend: Arc<B>,
    state: Arc<watch::Sender<SessionState>>,
    lookup: Mutex<Option<JoinHandle<()>>>,
}

impl<B: Backend> TaskSession<B> {
    pub fn new(backend: Arc<B>, viewer: Option<User>) -> Self {
        let (state, _) = watch::channel(SessionState {
            viewer,
            ..SessionState::default()
        });
        Self {
            backend,
            state: Arc::new(state),
            lookup: Mutex::new(None),
        }
    }

    /// Binds `task` to the session.
    ///
    /// A different task id resets the deal and starts a lookup; the same id
    /// only replaces the task record. Must be called from within a Tokio
    /// runtime.
    pub fn bind_task(&self, task: Option<Task>) {
        let new_id = task.as_ref().map(|t| t.id);
        let mut dispatch = None;

        self.state.send_modify(|state| {
            if state.task_id() == new_id {
                state.task = task;
                return;
            }
            state.generation += 1;
            state.task = task;
            state.deal = if new_id.is_some() {
                DealLookup::Loading
            } else {
                DealLookup::Idle
            };
            dispatch = new_id.map(|id| (id, state.generation));
        });

        let Some((task_id, generation)) = dispatch else {
            return;
        };

        info!("session bound to task {}", task_id);
        let handle = tokio::spawn(resolve_deal(
            Arc::clone(&self.backend),
            Arc::clone(&self.state),
            task_id,
            generation,
        ));

        let mut slot = self.lookup.lock().unwrap_or_else(PoisonError::into_inner);
        // The previous lookup is left to finish; its result fails the
        // generation check.
        *slot = Some(handle);
    }

    pub fn set_viewer(&self, viewer: Option<User>) {
        self.state.send_if_modified(|state| {
            if state.viewer == viewer {
                return false;
            }
            state.viewer = viewer;
            true
        });
    }

    /// Current flags. Synchronous, no I/O.
    pub fn snapshot(&self) -> DerivedSession {
        self.state.borrow().derived()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Notified on every input or lookup change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Waits until the current deal lookup (if any) has settled.
    pub async fn settled(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|state| !state.deal.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }
}

impl<B: Backend> Drop for TaskSession<B> {
    fn drop(&mut self) {
        let slot = self.lookup.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

async fn resolve_deal<B: Backend>(
    backend: Arc<B>,
    state: Arc<watch::Sender<SessionState>>,
    task_id: i64,
    generation: u64,
) {
    debug!("deal lookup dispatched for task {}", task_id);
    let result = backend.get_deal(task_id).await;

    state.send_if_modified(|current| {
        if current.generation != generation {
            debug!("discarding stale deal lookup for task {}", task_id);
            return false;
        }
        current.deal = match result {
            Ok(deal) => DealLookup::Resolved(deal),
            Err(err) => {
                warn!("deal lookup for task {} failed: {}", task_id, err);
                DealLookup::Failed(err.to_string())
            }
        };
        true
    });
}
