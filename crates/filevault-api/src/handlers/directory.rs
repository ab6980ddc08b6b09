use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use filevault_core::UserFileService;

use super::PathQuery;
use crate::error::ApiError;
use crate::identity::UserId;

type ApiResult = std::result::Result<Response, ApiError>;

pub async fn get_directory(
    State(service): State<Arc<UserFileService>>,
    UserId(user_id): UserId,
    Query(query): Query<PathQuery>,
) -> ApiResult {
    let entries = service.get_directory_info(user_id, &query.path).await?;
    Ok(Json(entries).into_response())
}

pub async fn create_directory(
    State(service): State<Arc<UserFileService>>,
    UserId(user_id): UserId,
    Query(query): Query<PathQuery>,
) -> ApiResult {
    let info = service.create_empty_directory(user_id, &query.path).await?;
    Ok((StatusCode::CREATED, Json(info)).into_response())
}
