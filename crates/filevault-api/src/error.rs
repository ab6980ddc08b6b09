use axum::{
    Json,
    extract::multipart::MultipartError,
    response::{IntoResponse, Response},
};
use filevault_common::error::VaultError;
use http::StatusCode;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

pub enum ApiError {
    Vault(VaultError),
    Multipart(MultipartError),
}

impl ApiError {
    fn status(error: &VaultError) -> StatusCode {
        match error {
            VaultError::InvalidPathFormat(_) => StatusCode::BAD_REQUEST,
            VaultError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            VaultError::ResourceNotFound(_) | VaultError::DirectoryNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            VaultError::ResourceAlreadyExists(_) => StatusCode::CONFLICT,
            VaultError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            VaultError::DirectoryDeletionPartialFailure { .. }
            | VaultError::ObjectStoreAccess(_)
            | VaultError::HandlerNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Vault(err) => err,
            ApiError::Multipart(err) => return err.into_response(),
        };

        let status = Self::status(&err);
        if status.is_server_error() {
            error!(code = err.error_code(), error = %err, "request failed");
        }
        let body = ErrorBody {
            message: err.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        ApiError::Vault(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart(err)
    }
}
