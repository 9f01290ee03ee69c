use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use tracing::info;

use tasky_types::api::{CreateTaskRequest, UpdateTaskRequest};
use tasky_types::{Deal, Message, Offer, Review, Task, TaskStatus};

use crate::error::ApiError;

/// In-memory marketplace state. Everything is lost on restart.
pub struct Store {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    tasks: BTreeMap<i64, Task>,
    offers: Vec<Offer>,
    deals: Vec<Deal>,
    messages: Vec<Message>,
    reviews: Vec<Review>,
    last_id: i64,
}

impl StoreInner {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn task(&self, task_id: i64) -> Result<&Task, ApiError> {
        self.tasks
            .get(&task_id)
            .ok_or_else(|| ApiError::not_found("task not found"))
    }

    /// Most recent deal of a task: the one with the highest id.
    fn latest_deal(&self, task_id: i64) -> Option<&Deal> {
        self.deals
            .iter()
            .filter(|d| d.task_id == Some(task_id))
            .max_by_key(|d| d.id)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    fn with_inner<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut StoreInner) -> Result<T, ApiError>,
    {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| ApiError::internal(format!("store lock poisoned: {e}")))?;
        f(&mut inner)
    }

    // -- Tasks --

    pub fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.with_inner(|inner| Ok(inner.tasks.values().cloned().collect()))
    }

    pub fn get_task(&self, task_id: i64) -> Result<Task, ApiError> {
        self.with_inner(|inner| inner.task(task_id).cloned())
    }

    pub fn create_task(&self, req: CreateTaskRequest) -> Result<Task, ApiError> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(ApiError::bad_request("title is required"));
        }
        self.with_inner(|inner| {
            let task = Task {
                id: inner.next_id(),
                title: title.to_owned(),
                description: req.description,
                status: req.status.unwrap_or(TaskStatus::Open),
                client_id: req.client_id,
                publisher_id: req.publisher_id,
                price: req.price,
                location: req.location,
                ..Task::default()
            };
            inner.tasks.insert(task.id, task.clone());
            info!("task {} created", task.id);
            Ok(task)
        })
    }

    pub fn update_task(&self, task_id: i64, req: UpdateTaskRequest) -> Result<Task, ApiError> {
        self.with_inner(|inner| {
            let task = inner
                .tasks
                .get_mut(&task_id)
                .ok_or_else(|| ApiError::not_found("task not found"))?;
            if let Some(title) = req.title {
                task.title = title;
            }
            if let Some(description) = req.description {
                task.description = Some(description);
            }
            if let Some(status) = req.status {
                task.status = status;
            }
            if let Some(tasker_id) = req.assigned_tasker_id {
                task.assigned_tasker_id = Some(tasker_id);
            }
            if let Some(price) = req.price {
                task.price = Some(price);
            }
            if let Some(location) = req.location {
                task.location = Some(location);
            }
            Ok(task.clone())
        })
    }

    // -- Deals --

    pub fn latest_deal(&self, task_id: i64) -> Result<Option<Deal>, ApiError> {
        self.with_inner(|inner| Ok(inner.latest_deal(task_id).cloned()))
    }

    /// Turns an offer into an accepted deal and assigns its tasker.
    pub fn accept_offer(&self, offer_id: i64) -> Result<Deal, ApiError> {
        self.with_inner(|inner| {
            let offer = inner
                .offers
                .iter()
                .find(|o| o.id == offer_id)
                .cloned()
                .ok_or_else(|| ApiError::not_found("offer not found"))?;
            let task_id = offer
                .task_id
                .ok_or_else(|| ApiError::bad_request("offer is not attached to a task"))?;
            let task = inner.task(task_id)?;
            let client_id = task
                .client_id
                .or(task.publisher_id)
                .ok_or_else(|| ApiError::bad_request("task has no client or publisher"))?;

            let deal = Deal {
                id: inner.next_id(),
                task_id: Some(task_id),
                tasker_id: offer.tasker_id,
                client_id: Some(client_id),
                offer_id: Some(offer.id),
                status: Some("accepted".into()),
            };
            inner.deals.push(deal.clone());

            if let Some(offer) = inner.offers.iter_mut().find(|o| o.id == offer_id) {
                offer.status = Some("accepted".into());
            }
            if let Some(task) = inner.tasks.get_mut(&task_id) {
                task.assigned_tasker_id = offer.tasker_id;
                task.status = TaskStatus::Assigned;
            }
            info!("offer {} accepted, deal {} on task {}", offer_id, deal.id, task_id);
            Ok(deal)
        })
    }

    // -- Offers --

    pub fn list_offers(&self, task_id: i64) -> Result<Vec<Offer>, ApiError> {
        self.with_inner(|inner| {
            inner.task(task_id)?;
            Ok(inner
                .offers
                .iter()
                .filter(|o| o.task_id == Some(task_id))
                .cloned()
                .collect())
        })
    }

    /// One offer per (task, tasker); a second submission replaces the first.
    pub fn upsert_offer(
        &self,
        task_id: i64,
        tasker_id: i64,
        amount: f64,
        message: String,
    ) -> Result<Offer, ApiError> {
        self.with_inner(|inner| {
            inner.task(task_id)?;
            let created_at = now();
            if let Some(existing) = inner
                .offers
                .iter_mut()
                .find(|o| o.task_id == Some(task_id) && o.tasker_id == Some(tasker_id))
            {
                existing.amount = Some(amount);
                existing.message = Some(message);
                existing.created_at = Some(created_at);
                return Ok(existing.clone());
            }
            let offer = Offer {
                id: inner.next_id(),
                task_id: Some(task_id),
                tasker_id: Some(tasker_id),
                amount: Some(amount),
                message: Some(message),
                status: Some("pending".into()),
                created_at: Some(created_at),
            };
            inner.offers.push(offer.clone());
            Ok(offer)
        })
    }

    // -- Messages --

    /// Messages of the task's latest deal, oldest first. Empty when the task
    /// or the deal does not exist.
    pub fn list_messages(&self, task_id: i64) -> Result<Vec<Message>, ApiError> {
        self.with_inner(|inner| {
            let Some(deal_id) = inner.latest_deal(task_id).map(|d| d.id) else {
                return Ok(Vec::new());
            };
            let mut messages: Vec<Message> = inner
                .messages
                .iter()
                .filter(|m| m.dealed_id == Some(deal_id))
                .cloned()
                .collect();
            messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(messages)
        })
    }

    pub fn create_message(
        &self,
        task_id: i64,
        sender_id: i64,
        body: String,
    ) -> Result<Message, ApiError> {
        self.with_inner(|inner| {
            inner.task(task_id)?;
            let deal = inner
                .latest_deal(task_id)
                .ok_or_else(|| ApiError::not_found("no deal for this task"))?;
            if deal.client_id != Some(sender_id) && deal.tasker_id != Some(sender_id) {
                return Err(ApiError::forbidden("sender_id does not belong to this deal"));
            }
            let deal_id = deal.id;
            let message = Message {
                id: inner.next_id(),
                body,
                created_at: Some(now()),
                sender_id: Some(sender_id),
                dealed_id: Some(deal_id),
            };
            inner.messages.push(message.clone());
            Ok(message)
        })
    }

    // -- Reviews --

    pub fn list_reviews(&self, task_id: i64) -> Result<Vec<Review>, ApiError> {
        self.with_inner(|inner| {
            inner.task(task_id)?;
            Ok(inner
                .reviews
                .iter()
                .filter(|r| r.task_id == Some(task_id))
                .cloned()
                .collect())
        })
    }

    /// One review per deal. The worker defaults to the deal's tasker.
    pub fn create_review(
        &self,
        task_id: i64,
        worker_id: Option<i64>,
        rating: u8,
        comment: String,
    ) -> Result<Review, ApiError> {
        self.with_inner(|inner| {
            inner.task(task_id)?;
            let deal = inner.latest_deal(task_id).cloned();
            let worker_id = worker_id.or_else(|| deal.as_ref().and_then(|d| d.tasker_id));
            let (Some(deal), Some(worker_id)) = (deal, worker_id) else {
                return Err(ApiError::bad_request(
                    "rating and worker_id/deal are required (could not infer them)",
                ));
            };
            if inner.reviews.iter().any(|r| r.deal_id == Some(deal.id)) {
                return Err(ApiError::conflict("a review already exists for this deal"));
            }
            let review = Review {
                id: inner.next_id(),
                task_id: Some(task_id),
                worker_id: Some(worker_id),
                rating: Some(rating),
                comment: Some(comment),
                target: Some("tasker".into()),
                deal_id: Some(deal.id),
                created_at: Some(now()),
            };
            inner.reviews.push(review.clone());
            Ok(review)
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    fn seeded() -> (Store, i64) {
        let store = Store::new();
        let task = store
            .create_task(CreateTaskRequest {
                title: "Pintar pieza".into(),
                description: None,
                status: None,
                client_id: Some(1),
                publisher_id: Some(1),
                price: Some(120.0),
                location: None,
            })
            .unwrap();
        (store, task.id)
    }

    #[test]
    fn create_task_requires_title() {
        let store = Store::new();
        let err = store
            .create_task(CreateTaskRequest {
                title: "  ".into(),
                description: None,
                status: None,
                client_id: None,
                publisher_id: None,
                price: None,
                location: None,
            })
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn offers_are_upserted_per_tasker() {
        let (store, task_id) = seeded();
        let first = store.upsert_offer(task_id, 2, 100.0, "a".into()).unwrap();
        let again = store.upsert_offer(task_id, 2, 90.0, "b".into()).unwrap();
        store.upsert_offer(task_id, 3, 95.0, "c".into()).unwrap();

        assert_eq!(first.id, again.id);
        let offers = store.list_offers(task_id).unwrap();
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].amount, Some(90.0));
    }

    #[test]
    fn accepting_an_offer_assigns_the_task() {
        let (store, task_id) = seeded();
        assert_eq!(store.latest_deal(task_id).unwrap(), None);

        let offer = store.upsert_offer(task_id, 2, 100.0, "a".into()).unwrap();
        let deal = store.accept_offer(offer.id).unwrap();

        assert_eq!(deal.client_id, Some(1));
        assert_eq!(deal.tasker_id, Some(2));
        assert_eq!(store.latest_deal(task_id).unwrap(), Some(deal));
        let task = store.get_task(task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(task.assigned_tasker_id, Some(2));
    }

    #[test]
    fn only_deal_members_can_chat() {
        let (store, task_id) = seeded();
        assert_eq!(
            store.create_message(task_id, 1, "hola".into()).unwrap_err().status,
            StatusCode::NOT_FOUND
        );

        let offer = store.upsert_offer(task_id, 2, 100.0, "a".into()).unwrap();
        store.accept_offer(offer.id).unwrap();

        store.create_message(task_id, 1, "hola".into()).unwrap();
        store.create_message(task_id, 2, "buenas".into()).unwrap();
        let err = store.create_message(task_id, 3, "intruso".into()).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let bodies: Vec<String> = store
            .list_messages(task_id)
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, vec!["hola", "buenas"]);
    }

    #[test]
    fn messages_of_unknown_task_are_empty() {
        let store = Store::new();
        assert!(store.list_messages(42).unwrap().is_empty());
    }

    #[test]
    fn one_review_per_deal() {
        let (store, task_id) = seeded();
        let err = store.create_review(task_id, Some(2), 5, "ok".into()).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let offer = store.upsert_offer(task_id, 2, 100.0, "a".into()).unwrap();
        store.accept_offer(offer.id).unwrap();

        let review = store.create_review(task_id, None, 4, "bien".into()).unwrap();
        assert_eq!(review.worker_id, Some(2));
        let err = store.create_review(task_id, None, 5, "otra".into()).unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(store.list_reviews(task_id).unwrap().len(), 1);
    }
}
