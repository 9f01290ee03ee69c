use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use tasky_types::api::{CreateOfferRequest, CreateReviewRequest, SendMessageRequest};
use tasky_types::{Deal, Message, Offer, Review, Role, Task, TaskStatus, User};

use crate::backend::Backend;
use crate::error::ClientError;

const LIST_LATENCY: Duration = Duration::from_millis(250);
const SEND_LATENCY: Duration = Duration::from_millis(200);
const REVIEW_LATENCY: Duration = Duration::from_millis(600);

/// Sender id of the other side of a demo conversation.
pub const DEMO_PEER_ID: i64 = 999;
/// Viewer id assumed when none is given.
pub const DEMO_VIEWER_ID: i64 = 10;
pub const DEMO_TASKER_ID: i64 = 99;

/// Offline [`Backend`] that makes every flow reachable: any task id resolves
/// to a completed task between the viewer and a demo tasker, the chat starts
/// with a short conversation, and writes are kept in memory.
pub struct DemoBackend {
    viewer: User,
    messages: Mutex<Vec<Message>>,
    offers: Mutex<Vec<Offer>>,
    next_id: AtomicI64,
}

impl DemoBackend {
    pub fn new(viewer: Option<User>) -> Self {
        let viewer = viewer.unwrap_or(User::new(DEMO_VIEWER_ID, Role::Client));
        let now = Utc::now();
        let minutes_ago = |m: i64| {
            (now - chrono::Duration::minutes(m)).to_rfc3339_opts(SecondsFormat::Millis, true)
        };
        let seeded = vec![
            demo_message(1, "Hola, ¿cuándo podrías venir?", minutes_ago(25), DEMO_PEER_ID),
            demo_message(2, "Hoy en la tarde puedo.", minutes_ago(23), viewer.id),
            demo_message(3, "Súper, gracias.", minutes_ago(21), DEMO_PEER_ID),
        ];

        Self {
            viewer,
            messages: Mutex::new(seeded),
            offers: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
        }
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

fn demo_message(id: i64, body: &str, created_at: String, sender_id: i64) -> Message {
    Message {
        id,
        body: body.to_owned(),
        created_at: Some(created_at),
        sender_id: Some(sender_id),
        dealed_id: None,
    }
}

fn lock_error() -> ClientError {
    ClientError::Transport("demo state lock poisoned".into())
}

impl Backend for DemoBackend {
    async fn get_task(&self, task_id: i64) -> Result<Task, ClientError> {
        let client_id = if self.viewer.role == Role::Client {
            self.viewer.id
        } else {
            DEMO_VIEWER_ID
        };
        Ok(Task {
            id: task_id,
            title: format!("Demo task #{task_id}"),
            description: Some("Forced into a completed state so chat, offers and reviews all show.".into()),
            status: TaskStatus::Completed,
            client_id: Some(client_id),
            assigned_tasker_id: Some(DEMO_TASKER_ID),
            ..Task::default()
        })
    }

    async fn get_deal(&self, task_id: i64) -> Result<Option<Deal>, ClientError> {
        debug!("demo task {} has no deal", task_id);
        Ok(None)
    }

    async fn list_offers(&self, _task_id: i64) -> Result<Vec<Offer>, ClientError> {
        tokio::time::sleep(LIST_LATENCY).await;
        Ok(self.offers.lock().map_err(|_| lock_error())?.clone())
    }

    async fn create_offer(
        &self,
        task_id: i64,
        request: &CreateOfferRequest,
    ) -> Result<Offer, ClientError> {
        tokio::time::sleep(SEND_LATENCY).await;
        let offer = Offer {
            id: self.next_id(),
            task_id: Some(task_id),
            tasker_id: Some(request.tasker_id),
            amount: Some(request.amount),
            message: Some(request.message.clone()),
            status: Some("pending".into()),
            created_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        };
        self.offers.lock().map_err(|_| lock_error())?.insert(0, offer.clone());
        Ok(offer)
    }

    async fn list_messages(&self, _task_id: i64) -> Result<Vec<Message>, ClientError> {
        tokio::time::sleep(LIST_LATENCY).await;
        Ok(self.messages.lock().map_err(|_| lock_error())?.clone())
    }

    async fn send_message(
        &self,
        _task_id: i64,
        request: &SendMessageRequest,
    ) -> Result<Option<Message>, ClientError> {
        tokio::time::sleep(SEND_LATENCY).await;
        let message = demo_message(
            self.next_id(),
            request.body.trim(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            request.sender_id.unwrap_or(self.viewer.id),
        );
        self.messages
            .lock()
            .map_err(|_| lock_error())?
            .push(message.clone());
        Ok(Some(message))
    }

    async fn create_review(
        &self,
        task_id: i64,
        request: &CreateReviewRequest,
    ) -> Result<Review, ClientError> {
        tokio::time::sleep(REVIEW_LATENCY).await;
        Ok(Review {
            id: self.next_id(),
            task_id: Some(task_id),
            worker_id: Some(request.worker_id),
            rating: Some(request.rating),
            comment: Some(request.comment.clone()),
            target: Some(request.target.clone()),
            deal_id: request.deal_id,
            created_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        })
    }
}
