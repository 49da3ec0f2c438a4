pub(crate) mod health;
pub(crate) mod quotes;
pub(crate) mod portfolios;
pub(crate) mod alerts;
pub(crate) mod news;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::errors::AppError;

/// Owner identity from the `X-User-Id` header. Token validation happens in
/// the auth layer in front of this service; by the time a request lands
/// here the header carries a verified user id.
pub struct OwnerId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(OwnerId)
            .ok_or(AppError::Unauthorized)
    }
}
