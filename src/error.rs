use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The catalog rejected the viewer's credentials or scopes.
    /// Never retried; the caller has to re-authenticate.
    #[error("Upstream access expired: {0}")]
    AuthExpired(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    /// Ranking or rewrite oracle failed or answered with something unusable
    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for failures that must reach the caller instead of being absorbed
    /// as an empty chunk.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, AppError::AuthExpired(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::AuthExpired(detail) = &self {
            tracing::warn!(detail = %detail, "Upstream credentials rejected");
            let body = Json(json!({
                "error": "YouTube access expired. Please sign out and sign back in.",
                "reauth": true
            }));
            return (StatusCode::FORBIDDEN, body).into_response();
        }

        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::ExternalApi(msg) | AppError::Oracle(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::AuthExpired(msg) => (StatusCode::FORBIDDEN, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_expired_maps_to_forbidden_with_reauth() {
        let response = AppError::AuthExpired("401".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_invalid_input_maps_to_bad_request() {
        let response = AppError::InvalidInput("empty".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_failures_map_to_bad_gateway() {
        let response = AppError::ExternalApi("500".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let response = AppError::Oracle("garbage".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_is_auth_expired() {
        assert!(AppError::AuthExpired("x".to_string()).is_auth_expired());
        assert!(!AppError::ExternalApi("x".to_string()).is_auth_expired());
    }
}
