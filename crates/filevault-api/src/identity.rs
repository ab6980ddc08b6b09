//! Caller identity. Authentication happens upstream; the proxy in front of
//! the API forwards the numeric id of the signed-in user in a header.

use axum::extract::FromRequestParts;
use filevault_common::error::VaultError;
use http::request::Parts;
use tracing::debug;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub u64);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            debug!("request without user id header");
            return Err(VaultError::Unauthenticated("missing user identity".to_string()).into());
        };

        value
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(UserId)
            .ok_or_else(|| {
                debug!("request with malformed user id header");
                VaultError::Unauthenticated("malformed user identity".to_string()).into()
            })
    }
}
