use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Multipart, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use bytes::BytesMut;
use filevault_common::error::VaultError;
use filevault_core::{Upload, UserFileService};
use filevault_storage::traits::stream_from_bytes;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tracing::debug;

use super::PathQuery;
use crate::error::ApiError;
use crate::identity::UserId;

type ApiResult = std::result::Result<Response, ApiError>;

/// Multipart field carrying uploaded files.
pub const UPLOAD_FIELD: &str = "object";

#[derive(Debug, Deserialize)]
pub struct MoveQuery {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

pub async fn get_resource(
    State(service): State<Arc<UserFileService>>,
    UserId(user_id): UserId,
    Query(query): Query<PathQuery>,
) -> ApiResult {
    let info = service.get_resource_info(user_id, &query.path).await?;
    Ok(Json(info).into_response())
}

pub async fn delete_resource(
    State(service): State<Arc<UserFileService>>,
    UserId(user_id): UserId,
    Query(query): Query<PathQuery>,
) -> ApiResult {
    service.delete_resource(user_id, &query.path).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn move_resource(
    State(service): State<Arc<UserFileService>>,
    UserId(user_id): UserId,
    Query(query): Query<MoveQuery>,
) -> ApiResult {
    let info = service.move_resource(user_id, &query.from, &query.to).await?;
    Ok(Json(info).into_response())
}

pub async fn search_resources(
    State(service): State<Arc<UserFileService>>,
    UserId(user_id): UserId,
    Query(query): Query<SearchQuery>,
) -> ApiResult {
    let found = service.search_resources(user_id, &query.query).await?;
    Ok(Json(found).into_response())
}

pub async fn download_resource(
    State(service): State<Arc<UserFileService>>,
    UserId(user_id): UserId,
    Query(query): Query<PathQuery>,
) -> ApiResult {
    let download = service.download_resource(user_id, &query.path).await?;
    let disposition = content_disposition(&download.file_name);
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(download.body),
    )
        .into_response())
}

/// Uploads every `object` part into the directory named by `path`.
pub async fn upload_resources(
    State(service): State<Arc<UserFileService>>,
    UserId(user_id): UserId,
    Query(query): Query<PathQuery>,
    multipart: Multipart,
) -> ApiResult {
    let uploads = read_uploads(
        multipart,
        service.max_upload_size(),
        service.max_request_size(),
    )
    .await?;
    let infos = service.upload_resources(user_id, &query.path, uploads).await?;
    Ok((StatusCode::CREATED, Json(infos)).into_response())
}

/// Buffers each file part, refusing any that grows past `max_size` and
/// stopping as soon as all parts together pass `max_total`.
async fn read_uploads(
    mut multipart: Multipart,
    max_size: u64,
    max_total: u64,
) -> Result<Vec<Upload>, ApiError> {
    let mut uploads = Vec::new();
    let mut total = 0_u64;
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "skipping unknown multipart field");
            continue;
        }
        let file_name = field.file_name().map(str::to_string).ok_or_else(|| {
            VaultError::InvalidPathFormat("the uploaded part has no file name".to_string())
        })?;

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await? {
            let size = (data.len() + chunk.len()) as u64;
            if size > max_size {
                return Err(VaultError::UploadTooLarge { size, max_size }.into());
            }
            total += chunk.len() as u64;
            if total > max_total {
                return Err(VaultError::UploadTooLarge {
                    size: total,
                    max_size: max_total,
                }
                .into());
            }
            data.extend_from_slice(&chunk);
        }

        let size = data.len() as u64;
        uploads.push(Upload {
            file_name,
            size,
            body: stream_from_bytes(data.freeze()),
        });
    }
    Ok(uploads)
}

fn content_disposition(file_name: &str) -> HeaderValue {
    let encoded = utf8_percent_encode(file_name, NON_ALPHANUMERIC);
    HeaderValue::from_str(&format!("attachment; filename*=UTF-8''{encoded}"))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
