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
pub struct OfferBody {
    pub tasker_id: Option<i64>,
    pub amount: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

pub async fn list_offers(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_offers(task_id)?))
}

pub async fn create_offer(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    payload: Result<Json<OfferBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let (Some(tasker_id), Some(amount)) = (body.tasker_id, body.amount) else {
        return Err(ApiError::bad_request("tasker_id and amount are required"));
    };
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ApiError::bad_request("amount must be greater than zero"));
    }
    let message = body.message.unwrap_or_default().trim().to_owned();
    let offer = state.store.upsert_offer(task_id, tasker_id, amount, message)?;
    Ok((StatusCode::CREATED, Json(offer)))
}

pub async fn accept_offer(
    State(state): State<AppState>,
    Path(offer_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deal = state.store.accept_offer(offer_id)?;
    Ok((StatusCode::CREATED, Json(deal)))
}
