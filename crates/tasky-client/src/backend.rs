use std::future::Future;

use tasky_types::api::{CreateOfferRequest, CreateReviewRequest, SendMessageRequest};
use tasky_types::{Deal, Message, Offer, Review, Task};

use crate::error::ClientError;

/// The REST operations the session, chat and forms depend on.
///
/// Implemented by [`crate::HttpBackend`] for a real server and by
/// [`crate::DemoBackend`] for offline demos; tests plug in scripted stubs.
pub trait Backend: Send + Sync + 'static {
    /// `GET /api/tasks/{id}`. A 404 becomes [`ClientError::NotFound`].
    fn get_task(&self, task_id: i64) -> impl Future<Output = Result<Task, ClientError>> + Send;

    /// `GET /api/tasks/{id}/deal`. A 404 means "no deal yet" and yields `None`.
    fn get_deal(
        &self,
        task_id: i64,
    ) -> impl Future<Output = Result<Option<Deal>, ClientError>> + Send;

    fn list_offers(
        &self,
        task_id: i64,
    ) -> impl Future<Output = Result<Vec<Offer>, ClientError>> + Send;

    fn create_offer(
        &self,
        task_id: i64,
        request: &CreateOfferRequest,
    ) -> impl Future<Output = Result<Offer, ClientError>> + Send;

    fn list_messages(
        &self,
        task_id: i64,
    ) -> impl Future<Output = Result<Vec<Message>, ClientError>> + Send;

    /// Returns the created message when the server echoed one with an id,
    /// `None` when the caller has to refetch to see it.
    fn send_message(
        &self,
        task_id: i64,
        request: &SendMessageRequest,
    ) -> impl Future<Output = Result<Option<Message>, ClientError>> + Send;

    fn create_review(
        &self,
        task_id: i64,
        request: &CreateReviewRequest,
    ) -> impl Future<Output = Result<Review, ClientError>> + Send;
}
