//! YouTube Data API v3 provider
//!
//! Acts on behalf of a viewer using the OAuth access token handed over by the
//! authentication layer. Endpoints used:
//! 1. `subscriptions` (mine=true) → subscribed channel ids
//! 2. `channels` (contentDetails) → each channel's uploads playlist
//! 3. `playlistItems` → recent uploads
//! 4. `videos` → durations, the popular chart, and full details
//!
//! Popular charts and channel → uploads mappings are not viewer specific and
//! are cached in Redis.

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{ApiChannel, ApiListResponse, ApiPlaylistItem, ApiSubscription, ApiVideo, Page, Video},
    services::{
        filters::parse_iso8601_duration,
        providers::{CatalogConnector, CatalogSource},
    },
};
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const POPULAR_CACHE_TTL: u64 = 3600; // 1 hour
const UPLOADS_CACHE_TTL: u64 = 604800; // 1 week
const SUBSCRIPTIONS_PAGE_SIZE: &str = "50";

/// Shared HTTP client, base URL and cache; hands out per-viewer catalogs
#[derive(Clone)]
pub struct YouTubeProvider {
    http_client: HttpClient,
    api_url: String,
    cache: Cache,
}

impl YouTubeProvider {
    pub fn new(cache: Cache, api_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_url,
            cache,
        })
    }
}

impl CatalogConnector for YouTubeProvider {
    fn connect(&self, access_token: &str) -> Arc<dyn CatalogSource> {
        Arc::new(YouTubeCatalog {
            provider: self.clone(),
            access_token: access_token.to_string(),
        })
    }
}

/// YouTube catalog bound to one viewer's access token
#[derive(Clone)]
pub struct YouTubeCatalog {
    provider: YouTubeProvider,
    access_token: String,
}

impl YouTubeCatalog {
    /// Issues a GET against `endpoint` and decodes the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = format!("{}/{}", self.provider.api_url, endpoint);

        let response = self
            .provider
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                endpoint = endpoint,
                status = %status,
                "YouTube API request failed"
            );
            return Err(classify_failure(status, &body));
        }

        let response_text = response.text().await?;
        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(endpoint = endpoint, error = %e, "Failed to deserialize YouTube response");
            AppError::ExternalApi(format!("Failed to parse YouTube response: {}", e))
        })
    }

    async fn fetch_popular(&self, region: &str, max_results: u32) -> AppResult<Vec<Video>> {
        let max_results = max_results.to_string();
        let response: ApiListResponse<ApiVideo> = self
            .get_json(
                "videos",
                &[
                    ("part", "snippet,contentDetails"),
                    ("chart", "mostPopular"),
                    ("regionCode", region),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;

        let videos: Vec<Video> = response
            .items
            .into_iter()
            .filter_map(|item| {
                let duration = item.duration().and_then(parse_iso8601_duration);
                item.into_video(duration)
            })
            .collect();

        tracing::info!(
            region = %region,
            results = videos.len(),
            provider = "youtube",
            "Popular chart fetched"
        );

        Ok(videos)
    }

    /// Looks up cached uploads playlists; a broken cache counts as all misses
    async fn cached_uploads(&self, channel_ids: &[String]) -> Vec<Option<String>> {
        let keys: Vec<CacheKey> = channel_ids
            .iter()
            .map(|id| CacheKey::ChannelUploads(id.clone()))
            .collect();

        match self.provider.cache.get_many_from_cache(&keys).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Uploads cache unavailable, resolving all channels");
                vec![None; channel_ids.len()]
            }
        }
    }
}

#[async_trait::async_trait]
impl CatalogSource for YouTubeCatalog {
    async fn list_subscriptions(&self, page_token: Option<String>) -> AppResult<Page<String>> {
        let mut query = vec![
            ("part", "snippet"),
            ("mine", "true"),
            ("maxResults", SUBSCRIPTIONS_PAGE_SIZE),
        ];
        if let Some(token) = page_token.as_deref() {
            query.push(("pageToken", token));
        }

        let response: ApiListResponse<ApiSubscription> =
            self.get_json("subscriptions", &query).await?;

        Ok(Page {
            items: response
                .items
                .into_iter()
                .filter_map(|s| s.snippet.resource_id.channel_id)
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn resolve_upload_collections(&self, channel_ids: &[String]) -> AppResult<Vec<String>> {
        if channel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let cached = self.cached_uploads(channel_ids).await;
        let misses: Vec<String> = channel_ids
            .iter()
            .zip(&cached)
            .filter(|(_, hit)| hit.is_none())
            .map(|(id, _)| id.clone())
            .collect();

        let mut resolved: HashMap<String, String> = HashMap::new();
        if !misses.is_empty() {
            let ids = misses.join(",");
            let response: ApiListResponse<ApiChannel> = self
                .get_json(
                    "channels",
                    &[("part", "contentDetails"), ("id", ids.as_str()), ("maxResults", "50")],
                )
                .await?;

            for channel in response.items {
                if let Some(uploads) = channel
                    .content_details
                    .and_then(|details| details.related_playlists.uploads)
                {
                    self.provider.cache.set_in_background(
                        &CacheKey::ChannelUploads(channel.id.clone()),
                        &uploads,
                        UPLOADS_CACHE_TTL,
                    );
                    resolved.insert(channel.id, uploads);
                }
            }
        }

        tracing::debug!(
            channels = channel_ids.len(),
            cache_misses = misses.len(),
            "Upload collections resolved"
        );

        Ok(channel_ids
            .iter()
            .zip(cached)
            .filter_map(|(id, hit)| hit.or_else(|| resolved.remove(id)))
            .collect())
    }

    async fn list_collection_items(
        &self,
        collection_id: &str,
        max_results: u32,
    ) -> AppResult<Vec<Video>> {
        let max_results = max_results.to_string();
        let response: ApiListResponse<ApiPlaylistItem> = self
            .get_json(
                "playlistItems",
                &[
                    ("part", "snippet"),
                    ("playlistId", collection_id),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.into_video())
            .collect())
    }

    async fn resolve_durations(&self, video_ids: &[String]) -> AppResult<HashMap<String, u64>> {
        if video_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = video_ids.join(",");
        let response: ApiListResponse<ApiVideo> = self
            .get_json("videos", &[("part", "contentDetails"), ("id", ids.as_str())])
            .await?;

        Ok(response
            .items
            .iter()
            .filter_map(|item| {
                let seconds = item.duration().and_then(parse_iso8601_duration)?;
                Some((item.id.clone(), seconds))
            })
            .collect())
    }

    async fn list_popular(&self, region: &str, max_results: u32) -> AppResult<Vec<Video>> {
        cached!(
            self.provider.cache,
            CacheKey::Popular(format!("{}:{}", region, max_results)),
            POPULAR_CACHE_TTL,
            self.fetch_popular(region, max_results)
        )
    }

    async fn resolve_details(&self, video_ids: &[String]) -> AppResult<Vec<Video>> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = video_ids.join(",");
        let response: ApiListResponse<ApiVideo> = self
            .get_json(
                "videos",
                &[("part", "snippet,contentDetails,statistics"), ("id", ids.as_str())],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let duration = item.duration().and_then(parse_iso8601_duration);
                item.into_video(duration)
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "youtube"
    }
}

/// Maps a failed upstream response onto the error taxonomy.
///
/// Credential and scope problems become `AuthExpired` so the caller can ask
/// the viewer to sign in again; everything else is a transient upstream error.
pub fn classify_failure(status: StatusCode, body: &str) -> AppError {
    const AUTH_MARKERS: [&str; 5] = [
        "insufficient authentication scopes",
        "insufficientPermissions",
        "Invalid Credentials",
        "invalid_grant",
        "forbidden",
    ];

    let auth_failure = status == StatusCode::UNAUTHORIZED
        || (status == StatusCode::FORBIDDEN
            && AUTH_MARKERS.iter().any(|marker| body.contains(marker)));

    if auth_failure {
        AppError::AuthExpired(format!("YouTube API returned status {}", status))
    } else {
        AppError::ExternalApi(format!("YouTube API returned status {}: {}", status, body))
    }
}
