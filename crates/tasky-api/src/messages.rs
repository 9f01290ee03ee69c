use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub sender_id: Option<i64>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_messages(task_id)?))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    payload: Result<Json<MessageBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let body = req.body.as_deref().map(str::trim).unwrap_or_default();
    let Some(sender_id) = req.sender_id.filter(|_| !body.is_empty()) else {
        return Err(ApiError::bad_request("body and sender_id are required"));
    };

    let message = state.store.create_message(task_id, sender_id, body.to_owned())?;
    debug!("message {} on task {} from {}", message.id, task_id, sender_id);
    Ok((StatusCode::CREATED, Json(message)))
}
