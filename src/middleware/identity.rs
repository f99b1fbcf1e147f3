use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;

/// Header carrying the id of the signed-in user, set by the fronting auth layer
pub const USER_ID_HEADER: &str = "x-user-id";

/// The signed-in user a request acts for, with the upstream access token the
/// catalog calls are made with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: String,
    pub access_token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

        let access_token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing upstream access token".to_string()))?;

        Ok(Viewer {
            user_id: user_id.to_string(),
            access_token: access_token.to_string(),
        })
    }
}
