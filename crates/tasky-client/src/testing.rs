//! Scripted [`Backend`] for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use tasky_types::api::{CreateOfferRequest, CreateReviewRequest, SendMessageRequest};
use tasky_types::{Deal, Message, Offer, Review, Task};

use crate::backend::Backend;
use crate::error::ClientError;

#[derive(Debug, Clone)]
pub enum DealReply {
    Found(Deal),
    Missing,
    Fails(u16),
}

#[derive(Debug, Clone)]
pub enum SendReply {
    Echo,
    NoId,
    Fails(u16),
}

pub struct StubBackend {
    pub tasks: Mutex<HashMap<i64, Task>>,
    deals: Mutex<HashMap<i64, (Duration, DealReply)>>,
    pub deal_calls: AtomicUsize,
    message_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Vec<Message>, ClientError>>>,
    pub list_calls: AtomicUsize,
    send_replies: Mutex<VecDeque<SendReply>>,
    pub sent: Mutex<Vec<SendMessageRequest>>,
    next_id: AtomicI64,
    pub offers: Mutex<Vec<Offer>>,
    pub offer_requests: Mutex<Vec<CreateOfferRequest>>,
    pub review_requests: Mutex<Vec<CreateReviewRequest>>,
}

/// Feeds `list_messages` calls one response at a time.
pub type MessageFeed = mpsc::UnboundedSender<Result<Vec<Message>, ClientError>>;

impl StubBackend {
    pub fn new() -> (Self, MessageFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stub = Self {
            tasks: Mutex::new(HashMap::new()),
            deals: Mutex::new(HashMap::new()),
            deal_calls: AtomicUsize::new(0),
            message_rx: tokio::sync::Mutex::new(rx),
            list_calls: AtomicUsize::new(0),
            send_replies: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1000),
            offers: Mutex::new(Vec::new()),
            offer_requests: Mutex::new(Vec::new()),
            review_requests: Mutex::new(Vec::new()),
        };
        (stub, tx)
    }

    pub fn with_deal(self, task_id: i64, delay: Duration, reply: DealReply) -> Self {
        self.deals.lock().unwrap().insert(task_id, (delay, reply));
        self
    }

    pub fn queue_send(&self, reply: SendReply) {
        self.send_replies.lock().unwrap().push_back(reply);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn deal_calls(&self) -> usize {
        self.deal_calls.load(Ordering::SeqCst)
    }
}

pub fn message(id: i64, body: &str, sender_id: i64) -> Message {
    Message {
        id,
        body: body.into(),
        created_at: Some("2026-10-15T10:00:00Z".into()),
        sender_id: Some(sender_id),
        dealed_id: None,
    }
}

pub fn deal(id: i64, task_id: i64, client_id: i64, tasker_id: i64) -> Deal {
    Deal {
        id,
        task_id: Some(task_id),
        tasker_id: Some(tasker_id),
        client_id: Some(client_id),
        offer_id: None,
        status: Some("accepted".into()),
    }
}

fn server_error(status: u16) -> ClientError {
    ClientError::Http {
        status,
        message: format!("HTTP {status}"),
    }
}

impl Backend for StubBackend {
    async fn get_task(&self, task_id: i64) -> Result<Task, ClientError> {
        self.tasks
            .lock()
            .unwrap()
            .get(&task_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("task {task_id}")))
    }

    async fn get_deal(&self, task_id: i64) -> Result<Option<Deal>, ClientError> {
        self.deal_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.deals.lock().unwrap().get(&task_id).cloned();
        let (delay, reply) = script.unwrap_or((Duration::ZERO, DealReply::Missing));
        tokio::time::sleep(delay).await;
        match reply {
            DealReply::Found(deal) => Ok(Some(deal)),
            DealReply::Missing => Ok(None),
            DealReply::Fails(status) => Err(server_error(status)),
        }
    }

    async fn list_offers(&self, _task_id: i64) -> Result<Vec<Offer>, ClientError> {
        Ok(self.offers.lock().unwrap().clone())
    }

    async fn create_offer(
        &self,
        task_id: i64,
        request: &CreateOfferRequest,
    ) -> Result<Offer, ClientError> {
        self.offer_requests.lock().unwrap().push(request.clone());
        Ok(Offer {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            task_id: Some(task_id),
            tasker_id: Some(request.tasker_id),
            amount: Some(request.amount),
            message: Some(request.message.clone()),
            status: Some("pending".into()),
            created_at: None,
        })
    }

    async fn list_messages(&self, _task_id: i64) -> Result<Vec<Message>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.message_rx.lock().await;
        rx.recv()
            .await
            .unwrap_or_else(|| Err(ClientError::Transport("message feed closed".into())))
    }

    async fn send_message(
        &self,
        _task_id: i64,
        request: &SendMessageRequest,
    ) -> Result<Option<Message>, ClientError> {
        self.sent.lock().unwrap().push(request.clone());
        let reply = self
            .send_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SendReply::Echo);
        match reply {
            SendReply::Echo => Ok(Some(Message {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                body: request.body.clone(),
                created_at: None,
                sender_id: request.sender_id,
                dealed_id: None,
            })),
            SendReply::NoId => Ok(None),
            SendReply::Fails(status) => Err(server_error(status)),
        }
    }

    async fn create_review(
        &self,
        task_id: i64,
        request: &CreateReviewRequest,
    ) -> Result<Review, ClientError> {
        self.review_requests.lock().unwrap().push(request.clone());
        Ok(Review {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            task_id: Some(task_id),
            worker_id: Some(request.worker_id),
            rating: Some(request.rating),
            comment: Some(request.comment.clone()),
            target: Some(request.target.clone()),
            deal_id: request.deal_id,
            created_at: None,
        })
    }
}
