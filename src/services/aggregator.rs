use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::HashSet;

use crate::{
    config::CurationSettings,
    error::AppResult,
    models::{truncate_chars, Video},
    services::{
        fanout::{per_chunk, settle, Settled, WAVE_WIDTH},
        filters::{dedup, filter_seen, filter_short_form},
        providers::{CatalogSource, MAX_BATCH_SIZE},
    },
};

/// Bounds on one walk over the viewer's subscriptions
#[derive(Debug, Clone)]
struct Traversal {
    max_subscription_pages: usize,
    items_per_collection: u32,
    published_since: DateTime<Utc>,
    /// Stop issuing waves once this many recent uploads were collected
    stop_after: Option<usize>,
}

/// Builds the two candidate pools the curator works from
pub struct CandidateAggregator<'a> {
    catalog: &'a dyn CatalogSource,
    settings: &'a CurationSettings,
}

impl<'a> CandidateAggregator<'a> {
    pub fn new(catalog: &'a dyn CatalogSource, settings: &'a CurationSettings) -> Self {
        Self { catalog, settings }
    }

    fn published_since(&self) -> DateTime<Utc> {
        Utc::now() - Duration::days(self.settings.recency_days)
    }

    /// Recent long-form uploads from subscribed channels, newest first,
    /// capped at `recent_cap`. Already-shown videos are not excluded.
    pub async fn recent_subscription_videos(&self) -> AppResult<Vec<Video>> {
        let cap = self.settings.recent_cap;
        let traversal = Traversal {
            max_subscription_pages: self.settings.recent_subscription_pages,
            items_per_collection: self.settings.items_per_collection,
            published_since: self.published_since(),
            stop_after: Some(cap * 2),
        };

        let uploads = dedup(self.subscription_uploads(&traversal).await?);
        let mut videos = filter_short_form(
            self.catalog,
            uploads,
            self.settings.short_form_threshold_secs,
        )
        .await?;

        videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        videos.truncate(cap);
        let videos = self.candidate_view(videos);

        tracing::info!(
            videos = videos.len(),
            provider = self.catalog.name(),
            "Recent subscription videos collected"
        );

        Ok(videos)
    }

    /// Candidate pool for curation: subscription uploads plus the popular
    /// chart, deduplicated, minus everything in `shown`, minus short-form.
    ///
    /// Either source may fail transiently as long as the other produced
    /// videos.
    pub async fn candidate_pool(&self, shown: &HashSet<String>) -> AppResult<Vec<Video>> {
        let traversal = Traversal {
            max_subscription_pages: self.settings.candidate_subscription_pages,
            items_per_collection: self.settings.items_per_collection,
            published_since: self.published_since(),
            stop_after: None,
        };

        let (mut pool, subscription_failure) = match self.subscription_uploads(&traversal).await {
            Ok(uploads) => (uploads, None),
            Err(e) if e.is_auth_expired() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Subscription uploads unavailable, continuing with popular videos");
                (Vec::new(), Some(e))
            }
        };
        let from_subscriptions = pool.len();
        pool.extend(self.popular_long_form().await?);

        // Transient subscription failures only surface when nothing else came back
        if let (true, Some(e)) = (pool.is_empty(), subscription_failure) {
            return Err(e);
        }

        let unique = dedup(pool);
        let unique_count = unique.len();
        let fresh = filter_seen(unique, shown);
        let fresh_count = fresh.len();
        let candidates = filter_short_form(
            self.catalog,
            fresh,
            self.settings.short_form_threshold_secs,
        )
        .await?;
        let candidates = self.candidate_view(candidates);

        tracing::info!(
            from_subscriptions,
            unique = unique_count,
            unseen = fresh_count,
            candidates = candidates.len(),
            provider = self.catalog.name(),
            "Candidate pool assembled"
        );

        Ok(candidates)
    }

    /// Shortens descriptions to the candidate length
    fn candidate_view(&self, mut videos: Vec<Video>) -> Vec<Video> {
        let max_chars = self.settings.candidate_description_chars;
        for video in videos.iter_mut() {
            video.description = truncate_chars(&video.description, max_chars);
        }
        videos
    }

    /// Popular videos at or above the short-form threshold, using the
    /// durations the chart already carries.
    ///
    /// A transient failure of this secondary source yields no videos.
    async fn popular_long_form(&self) -> AppResult<Vec<Video>> {
        let threshold = self.settings.short_form_threshold_secs;

        match self
            .catalog
            .list_popular(&self.settings.popular_region, self.settings.popular_max)
            .await
        {
            Ok(videos) => Ok(videos
                .into_iter()
                .filter(|v| v.duration_seconds.is_some_and(|secs| secs >= threshold))
                .collect()),
            Err(e) if e.is_auth_expired() => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Error fetching popular videos, continuing without them");
                Ok(Vec::new())
            }
        }
    }

    /// Subscriptions → upload collections → recent items within the window
    async fn subscription_uploads(&self, traversal: &Traversal) -> AppResult<Vec<Video>> {
        let channels = self.subscribed_channels(traversal.max_subscription_pages).await?;
        if channels.is_empty() {
            return Ok(Vec::new());
        }

        let collections: Vec<String> = per_chunk(&channels, MAX_BATCH_SIZE, "channel", |ids| {
            self.catalog.resolve_upload_collections(ids)
        })
        .await?
        .into_required("channel")?
        .into_iter()
        .flatten()
        .collect();

        self.recent_uploads(&collections, traversal).await
    }

    /// Subscribed channel ids across at most `max_pages` pages.
    ///
    /// The first page is required; a failure on a later page keeps what was
    /// already listed.
    async fn subscribed_channels(&self, max_pages: usize) -> AppResult<Vec<String>> {
        let mut channels = Vec::new();
        let mut page_token = None;

        for page_number in 0..max_pages {
            let page = match self.catalog.list_subscriptions(page_token.take()).await {
                Ok(page) => page,
                Err(e) if page_number == 0 || e.is_auth_expired() => return Err(e),
                Err(e) => {
                    tracing::warn!(page = page_number, error = %e, "Subscription page failed, using pages so far");
                    break;
                }
            };

            channels.extend(page.items);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(channels = channels.len(), "Subscribed channels listed");
        Ok(channels)
    }

    /// Fetches collections in waves of [`WAVE_WIDTH`] concurrent calls,
    /// keeping items published inside the window.
    async fn recent_uploads(
        &self,
        collections: &[String],
        traversal: &Traversal,
    ) -> AppResult<Vec<Video>> {
        let mut settled: Settled<Vec<Video>> = Settled::empty();
        let mut collected = 0usize;

        for wave in collections.chunks(WAVE_WIDTH) {
            let results = join_all(wave.iter().map(|collection_id| {
                self.catalog
                    .list_collection_items(collection_id, traversal.items_per_collection)
            }))
            .await;

            let mut wave_settled = settle(results, "collection")?;
            for items in wave_settled.succeeded.iter_mut() {
                items.retain(|video| video.published_at >= traversal.published_since);
                collected += items.len();
            }
            settled.merge(wave_settled);

            if traversal.stop_after.is_some_and(|limit| collected >= limit) {
                tracing::debug!(collected, "Enough recent uploads, stopping early");
                break;
            }
        }

        Ok(settled
            .into_required("collection")?
            .into_iter()
            .flatten()
            .collect())
    }
}
