use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod user_preferences;

pub use user_preferences::{CriteriaSource, UserPreferences, DEFAULT_CRITERIA};

/// A video as surfaced to the client.
///
/// Identity is `id`; everything else is descriptive and depends on where the
/// record was fetched (candidate listings carry a short description, detail
/// lookups carry duration and view count).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    pub channel_title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
}

/// Durable marker that a video was surfaced to (and possibly rejected by) a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShownRecord {
    pub user_id: String,
    pub video_id: String,
    pub shown_date: NaiveDate,
    pub was_rejected: bool,
    pub rejection_reason: Option<String>,
}

/// A past rejection, as fed back into ranking and listed in history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub video_id: String,
    pub reason: Option<String>,
    pub shown_date: NaiveDate,
}

/// Refresh counter for one user-day
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshQuota {
    pub user_id: String,
    pub date: NaiveDate,
    pub count: u32,
}

/// One page of an upstream collection
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// Truncates to at most `max_chars` characters without splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

// ============================================================================
// YouTube Data API v3 Types
// ============================================================================

/// Envelope shared by every `list` endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceId {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSubscription {
    pub snippet: ApiSubscriptionSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSubscriptionSnippet {
    pub resource_id: ApiResourceId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiChannel {
    pub id: String,
    #[serde(default)]
    pub content_details: Option<ApiChannelContentDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiChannelContentDetails {
    pub related_playlists: ApiRelatedPlaylists,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRelatedPlaylists {
    #[serde(default)]
    pub uploads: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiThumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiThumbnails {
    #[serde(default)]
    pub medium: Option<ApiThumbnail>,
    #[serde(default)]
    pub default: Option<ApiThumbnail>,
}

impl ApiThumbnails {
    fn preferred_url(self) -> Option<String> {
        self.medium.or(self.default).map(|t| t.url)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPlaylistItem {
    pub snippet: ApiPlaylistItemSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPlaylistItemSnippet {
    pub published_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnails: ApiThumbnails,
    pub resource_id: ApiResourceId,
}

impl ApiPlaylistItem {
    /// Candidate view of an upload; `None` when the item carries no video id
    pub fn into_video(self) -> Option<Video> {
        let snippet = self.snippet;
        let id = snippet.resource_id.video_id?;

        Some(Video {
            id,
            title: snippet.title,
            channel_title: snippet.channel_title,
            description: snippet.description.unwrap_or_default(),
            thumbnail_url: snippet.thumbnails.preferred_url(),
            published_at: snippet.published_at,
            duration_seconds: None,
            view_count: None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVideo {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<ApiVideoSnippet>,
    #[serde(default)]
    pub content_details: Option<ApiVideoContentDetails>,
    #[serde(default)]
    pub statistics: Option<ApiVideoStatistics>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVideoSnippet {
    pub published_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnails: ApiThumbnails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiVideoContentDetails {
    #[serde(default)]
    pub duration: Option<String>,
}

/// The API serializes counters as strings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVideoStatistics {
    #[serde(default)]
    pub view_count: Option<String>,
}

impl ApiVideo {
    /// Raw ISO-8601 duration, when the `contentDetails` part was requested
    pub fn duration(&self) -> Option<&str> {
        self.content_details.as_ref()?.duration.as_deref()
    }

    /// Full view of a video; `None` when the `snippet` part is missing
    pub fn into_video(self, duration_seconds: Option<u64>) -> Option<Video> {
        let snippet = self.snippet?;
        let view_count = self
            .statistics
            .and_then(|s| s.view_count)
            .and_then(|count| count.parse::<u64>().ok());

        Some(Video {
            id: self.id,
            title: snippet.title,
            channel_title: snippet.channel_title,
            description: snippet.description.unwrap_or_default(),
            thumbnail_url: snippet.thumbnails.preferred_url(),
            published_at: snippet.published_at,
            duration_seconds,
            view_count,
        })
    }
}
