//! Development backend for Tasky: an in-memory marketplace store and the
//! axum handlers that expose it under `/api`.

pub mod error;
pub mod messages;
pub mod offers;
pub mod reviews;
pub mod store;
pub mod tasks;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::store::Store;

pub use error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Store,
}

impl AppStateInner {
    pub fn new(store: Store) -> AppState {
        Arc::new(Self { store })
    }
}

/// All `/api` routes bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/api/tasks/{task_id}", get(tasks::get_task).put(tasks::update_task))
        .route("/api/tasks/{task_id}/deal", get(tasks::get_deal))
        .route(
            "/api/tasks/{task_id}/offers",
            get(offers::list_offers).post(offers::create_offer),
        )
        .route("/api/offers/{offer_id}/accept", post(offers::accept_offer))
        .route(
            "/api/tasks/{task_id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route(
            "/api/tasks/{task_id}/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .with_state(state)
}
