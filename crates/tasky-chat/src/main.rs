use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tasky_client::demo::DEMO_VIEWER_ID;
use tasky_client::{Backend, ChatState, ChatSync, ClientConfig, DemoBackend, HttpBackend, TaskSession};
use tasky_types::{Role, User};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasky_chat=info,tasky_client=info".into()),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let task_id = task_id_from_env()?;
    let viewer = viewer_from_env()?;

    if config.demo {
        let viewer = viewer.or(Some(User::new(DEMO_VIEWER_ID, Role::Client)));
        info!("demo mode, nothing leaves this process");
        let backend = Arc::new(DemoBackend::new(viewer.clone()));
        run(backend, &config, task_id, viewer).await
    } else {
        let backend = Arc::new(HttpBackend::new(&config)?);
        info!("using backend at {}", backend.base_url());
        run(backend, &config, task_id, viewer).await
    }
}

fn task_id_from_env() -> anyhow::Result<i64> {
    let raw = std::env::var("TASKY_TASK_ID")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .context("usage: tasky-chat <task-id> (or set TASKY_TASK_ID)")?;
    raw.trim()
        .parse()
        .with_context(|| format!("task id is not an integer: {raw}"))
}

fn viewer_from_env() -> anyhow::Result<Option<User>> {
    let Ok(raw) = std::env::var("TASKY_VIEWER_ID") else {
        return Ok(None);
    };
    let id: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("TASKY_VIEWER_ID is not an integer: {raw}"))?;
    let role = match std::env::var("TASKY_VIEWER_ROLE")
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "client" => Role::Client,
        "tasker" => Role::Tasker,
        _ => Role::Unknown,
    };
    Ok(Some(User::new(id, role)))
}

async fn run<B: Backend>(
    backend: Arc<B>,
    config: &ClientConfig,
    task_id: i64,
    viewer: Option<User>,
) -> anyhow::Result<()> {
    let task = backend
        .get_task(task_id)
        .await
        .with_context(|| format!("loading task {task_id}"))?;
    info!("task {} \"{}\" is {}", task.id, task.title, task.status.as_str());

    let session = TaskSession::new(backend.clone(), viewer.clone());
    session.bind_task(Some(task));
    let state = session.settled().await;
    if let Some(err) = state.deal.error() {
        warn!("deal lookup failed: {}", err);
    }

    let flags = state.derived();
    info!(
        publisher = ?flags.publisher_id,
        tasker = ?flags.assigned_tasker_id,
        deal = ?flags.deal_id,
        is_publisher = flags.is_publisher,
        can_chat = flags.can_chat,
        can_review_tasker = flags.can_review_tasker,
        can_send_offer = flags.can_send_offer,
        "session derived"
    );
    if !flags.can_chat {
        info!("chat is not available to this viewer");
        return Ok(());
    }

    let viewer_id = viewer.as_ref().map(|v| v.id);
    let chat = Arc::new(ChatSync::new(backend, config.refresh_interval, viewer));
    let mut updates = chat.subscribe();
    chat.bind(task_id).await;
    let (outbox, sender) = spawn_sender(Arc::clone(&chat));

    let mut printed = HashSet::new();
    let mut last_error: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                print_new(&state, &mut printed, viewer_id);
                if state.error != last_error {
                    if let Some(err) = &state.error {
                        warn!("chat: {}", err);
                    }
                    last_error = state.error.clone();
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if outbox.send(line).is_err() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                interrupted = true;
                break;
            }
        }
    }

    // EOF lets queued lines go out; Ctrl-C drops them.
    drop(outbox);
    if interrupted {
        sender.abort();
    } else {
        tokio::select! {
            _ = sender => {}
            _ = &mut ctrl_c => debug!("pending sends abandoned"),
        }
    }

    chat.unbind().await;
    info!("chat closed");
    Ok(())
}

/// Sends queued lines one at a time, in order, off the input loop.
fn spawn_sender<B: Backend>(
    chat: Arc<ChatSync<B>>,
) -> (mpsc::UnboundedSender<String>, JoinHandle<()>) {
    let (outbox, mut queued) = mpsc::unbounded_channel::<String>();
    let handle = tokio::spawn(async move {
        while let Some(line) = queued.recv().await {
            match chat.send(&line).await {
                Ok(outcome) => debug!(?outcome, "send finished"),
                Err(e) => warn!("send failed: {}", e),
            }
        }
    });
    (outbox, handle)
}

fn print_new(state: &ChatState, printed: &mut HashSet<i64>, viewer_id: Option<i64>) {
    for message in &state.messages {
        if !printed.insert(message.id) {
            continue;
        }
        let at = message
            .created_at_utc()
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".into());
        let who = match (message.sender_id, viewer_id) {
            (Some(sender), Some(me)) if sender == me => "you".to_owned(),
            (Some(sender), _) => format!("#{sender}"),
            (None, _) => "?".to_owned(),
        };
        println!("[{at}] {who}: {}", message.body);
    }
}
