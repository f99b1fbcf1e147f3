//! Video catalog abstraction
//!
//! The curation pipeline only talks to the catalog through [`CatalogSource`],
//! so the YouTube Data API implementation can be swapped for fixtures in
//! tests. A [`CatalogConnector`] binds the viewer's upstream access token to
//! a source for the duration of one request.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{Page, Video},
};

pub mod youtube;

pub use youtube::{YouTubeCatalog, YouTubeProvider};

/// Largest id batch a single catalog lookup accepts
pub const MAX_BATCH_SIZE: usize = 50;

/// Paginated and batched reads against the upstream video catalog.
///
/// Any method may fail with `AppError::AuthExpired` when the upstream
/// rejects the viewer's credentials; other failures are transient.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// One page of the viewer's subscribed channel ids
    async fn list_subscriptions(&self, page_token: Option<String>) -> AppResult<Page<String>>;

    /// Upload collection id per channel, for at most [`MAX_BATCH_SIZE`]
    /// channels. Channels without one are omitted.
    async fn resolve_upload_collections(&self, channel_ids: &[String]) -> AppResult<Vec<String>>;

    /// Most recent items of a collection, newest first
    async fn list_collection_items(
        &self,
        collection_id: &str,
        max_results: u32,
    ) -> AppResult<Vec<Video>>;

    /// Duration in seconds per id, for at most [`MAX_BATCH_SIZE`] ids.
    /// Ids the upstream omits or reports unparseable durations for are absent.
    async fn resolve_durations(&self, video_ids: &[String]) -> AppResult<HashMap<String, u64>>;

    /// Currently popular videos in a region, with durations populated
    async fn list_popular(&self, region: &str, max_results: u32) -> AppResult<Vec<Video>>;

    /// Full records for at most [`MAX_BATCH_SIZE`] ids, in upstream order
    async fn resolve_details(&self, video_ids: &[String]) -> AppResult<Vec<Video>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Produces a catalog source acting on behalf of one viewer
pub trait CatalogConnector: Send + Sync {
    fn connect(&self, access_token: &str) -> Arc<dyn CatalogSource>;
}
