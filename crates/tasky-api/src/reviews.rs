use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default, alias = "tasker_id")]
    pub worker_id: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_reviews(task_id)?))
}

pub async fn create_review(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    payload: Result<Json<ReviewBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let rating = body
        .rating
        .ok_or_else(|| ApiError::bad_request("rating is required"))?;
    let rating = u8::try_from(rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| ApiError::bad_request("rating must be between 1 and 5"))?;
    let comment = body.comment.unwrap_or_default().trim().to_owned();

    let review = state
        .store
        .create_review(task_id, body.worker_id, rating, comment)?;
    Ok((StatusCode::CREATED, Json(review)))
}
