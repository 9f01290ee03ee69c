use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use tasky_types::api::{CreateTaskRequest, UpdateTaskRequest};

use crate::AppState;
use crate::error::ApiError;

pub async fn list_tasks(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_tasks()?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.get_task(task_id)?))
}

pub async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let task = state.store.create_task(req)?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    Ok(Json(state.store.update_task(task_id, req)?))
}

/// Latest deal of the task; 404 while nobody has been hired.
pub async fn get_deal(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .latest_deal(task_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("no deal for this task"))
}
