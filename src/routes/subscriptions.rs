use axum::{extract::State, Json};

use super::{recommendations::VideosResponse, AppState};
use crate::{error::AppResult, middleware::Viewer};

/// Recent long-form uploads from the viewer's subscriptions
pub async fn recent(State(state): State<AppState>, viewer: Viewer) -> AppResult<Json<VideosResponse>> {
    let catalog = state.catalogs.connect(&viewer.access_token);
    let videos = state
        .curator
        .get_recent_subscription_videos(catalog.as_ref())
        .await?;
    Ok(Json(VideosResponse { videos }))
}
