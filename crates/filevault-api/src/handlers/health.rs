use axum::{http::StatusCode, response::IntoResponse};

pub async fn health_live() -> impl IntoResponse {
    StatusCode::OK
}
