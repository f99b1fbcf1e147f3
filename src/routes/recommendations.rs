use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::AppState;
use crate::{
    error::{AppError, AppResult},
    middleware::Viewer,
    models::Video,
    services::RefreshOutcome,
};

#[derive(Debug, Serialize)]
pub struct VideosResponse {
    pub videos: Vec<Video>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub videos: Vec<Video>,
    pub refreshes_remaining: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

impl RejectRequest {
    /// An empty body means no reason; anything else must be valid JSON
    fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::InvalidInput(format!("Invalid reject body: {}", e)))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectResponse {
    pub message: &'static str,
    pub updated_criteria: String,
}

/// Curated videos; does not spend a refresh
pub async fn recommended(
    State(state): State<AppState>,
    viewer: Viewer,
) -> AppResult<Json<VideosResponse>> {
    let catalog = state.catalogs.connect(&viewer.access_token);
    let videos = state
        .curator
        .get_recommendations(&viewer.user_id, catalog.as_ref())
        .await?;
    Ok(Json(VideosResponse { videos }))
}

/// Fresh curated videos, limited per user per day
pub async fn refresh(State(state): State<AppState>, viewer: Viewer) -> AppResult<Response> {
    let catalog = state.catalogs.connect(&viewer.access_token);
    let outcome = state
        .curator
        .refresh_recommendations(&viewer.user_id, catalog.as_ref())
        .await?;

    let response = match outcome {
        RefreshOutcome::Refreshed {
            videos,
            refreshes_remaining,
        } => Json(RefreshResponse {
            videos,
            refreshes_remaining,
        })
        .into_response(),
        RefreshOutcome::QuotaExceeded { max_daily } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": format!("Daily refresh limit reached ({} per day)", max_daily),
                "refreshesRemaining": 0
            })),
        )
            .into_response(),
    };

    Ok(response)
}

/// Rejects a video and adapts the viewer's criteria. The body is optional.
pub async fn reject(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(video_id): Path<String>,
    body: Bytes,
) -> AppResult<Json<RejectResponse>> {
    let request = RejectRequest::from_body(&body)?;
    let catalog = state.catalogs.connect(&viewer.access_token);

    let updated_criteria = state
        .curator
        .reject_video(
            &viewer.user_id,
            &video_id,
            request.reason.as_deref(),
            catalog.as_ref(),
        )
        .await?;

    Ok(Json(RejectResponse {
        message: "Video rejected and preferences updated",
        updated_criteria,
    }))
}
