use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    error::AppResult,
    middleware::Viewer,
    models::{CriteriaSource, Rejection, UserPreferences},
    services::UsageStats,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub curation_criteria: String,
    pub updated_by: CriteriaSource,
}

impl From<UserPreferences> for SettingsResponse {
    fn from(preferences: UserPreferences) -> Self {
        Self {
            curation_criteria: preferences.criteria_text,
            updated_by: preferences.updated_by,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub curation_criteria: String,
}

#[derive(Debug, Serialize)]
pub struct RejectionsResponse {
    pub rejections: Vec<Rejection>,
}

pub async fn get_settings(
    State(state): State<AppState>,
    viewer: Viewer,
) -> AppResult<Json<SettingsResponse>> {
    let preferences = state.curator.get_settings(&viewer.user_id).await?;
    Ok(Json(preferences.into()))
}

pub async fn update_settings(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(request): Json<UpdateSettingsRequest>,
) -> AppResult<Json<SettingsResponse>> {
    let preferences = state
        .curator
        .update_settings(&viewer.user_id, &request.curation_criteria)
        .await?;
    Ok(Json(preferences.into()))
}

pub async fn stats(State(state): State<AppState>, viewer: Viewer) -> AppResult<Json<UsageStats>> {
    Ok(Json(state.curator.usage_stats(&viewer.user_id).await?))
}

pub async fn rejections(
    State(state): State<AppState>,
    viewer: Viewer,
) -> AppResult<Json<RejectionsResponse>> {
    let rejections = state.curator.rejection_history(&viewer.user_id).await?;
    Ok(Json(RejectionsResponse { rejections }))
}
