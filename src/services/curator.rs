use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    config::CurationSettings,
    db::RecordStore,
    error::AppResult,
    models::{truncate_chars, CriteriaSource, Rejection, UserPreferences, Video},
    services::{
        adaptation,
        aggregator::CandidateAggregator,
        fanout::per_chunk,
        oracle::Oracle,
        providers::{CatalogSource, MAX_BATCH_SIZE},
        quota::QuotaGate,
        selector::CurationSelector,
    },
};

const UNKNOWN_TITLE: &str = "Unknown video";

/// What a refresh request produced
#[derive(Debug)]
pub enum RefreshOutcome {
    Refreshed {
        videos: Vec<Video>,
        refreshes_remaining: u32,
    },
    /// Not an error: the user spent today's budget
    QuotaExceeded { max_daily: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub refreshes_used: u32,
    pub refreshes_remaining: u32,
    pub max_daily: u32,
}

/// Entry point of the curation pipeline.
///
/// Holds the long-lived collaborators; the catalog is passed per call since
/// it acts with the requesting viewer's credentials.
pub struct Curator {
    store: Arc<dyn RecordStore>,
    oracle: Arc<dyn Oracle>,
    quota: QuotaGate,
    settings: CurationSettings,
}

impl Curator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        oracle: Arc<dyn Oracle>,
        settings: CurationSettings,
    ) -> Self {
        let quota = QuotaGate::new(store.clone(), settings.max_daily_refreshes);
        Self {
            store,
            oracle,
            quota,
            settings,
        }
    }

    pub fn settings(&self) -> &CurationSettings {
        &self.settings
    }

    /// Recent long-form uploads of the viewer's subscriptions. Not a
    /// "shown" event; nothing is recorded.
    pub async fn get_recent_subscription_videos(
        &self,
        catalog: &dyn CatalogSource,
    ) -> AppResult<Vec<Video>> {
        CandidateAggregator::new(catalog, &self.settings)
            .recent_subscription_videos()
            .await
    }

    /// Curated recommendations without spending quota
    pub async fn get_recommendations(
        &self,
        user_id: &str,
        catalog: &dyn CatalogSource,
    ) -> AppResult<Vec<Video>> {
        self.curate(user_id, catalog).await
    }

    /// Spends one daily refresh, then curates.
    ///
    /// The refresh stays spent if the pipeline fails afterwards.
    pub async fn refresh_recommendations(
        &self,
        user_id: &str,
        catalog: &dyn CatalogSource,
    ) -> AppResult<RefreshOutcome> {
        let decision = self.quota.try_consume(user_id).await?;
        if !decision.granted {
            tracing::info!(user_id = %user_id, "Refresh denied, daily limit reached");
            return Ok(RefreshOutcome::QuotaExceeded {
                max_daily: self.quota.max_daily(),
            });
        }

        let videos = self.curate(user_id, catalog).await?;
        let refreshes_remaining = self.quota.remaining(user_id).await?;

        Ok(RefreshOutcome::Refreshed {
            videos,
            refreshes_remaining,
        })
    }

    async fn curate(&self, user_id: &str, catalog: &dyn CatalogSource) -> AppResult<Vec<Video>> {
        let (shown, preferences, rejections) = tokio::try_join!(
            self.store.get_shown_ids(user_id),
            self.store.get_preferences(user_id),
            self.store
                .get_rejections(user_id, self.settings.rejection_context_limit),
        )?;

        let candidates = CandidateAggregator::new(catalog, &self.settings)
            .candidate_pool(&shown)
            .await?;
        if candidates.is_empty() {
            tracing::info!(user_id = %user_id, "No candidates left to curate");
            return Ok(Vec::new());
        }

        let selected = CurationSelector::new(self.oracle.as_ref(), &self.settings)
            .select(&candidates, &preferences.criteria_text, &rejections)
            .await;

        let videos = self.detailed(catalog, &selected).await?;
        self.store.upsert_shown(user_id, &selected).await?;

        tracing::info!(
            user_id = %user_id,
            candidates = candidates.len(),
            selected = selected.len(),
            returned = videos.len(),
            "Recommendations curated"
        );

        Ok(videos)
    }

    /// Full records for `ids`, in the order given. Ids the catalog no longer
    /// knows are skipped.
    async fn detailed(&self, catalog: &dyn CatalogSource, ids: &[String]) -> AppResult<Vec<Video>> {
        let mut by_id: HashMap<String, Video> = per_chunk(ids, MAX_BATCH_SIZE, "details", |chunk| {
            catalog.resolve_details(chunk)
        })
        .await?
        .into_required("details")?
        .into_iter()
        .flatten()
        .map(|video| (video.id.clone(), video))
        .collect();

        let description_chars = self.settings.detail_description_chars;
        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(|mut video| {
                video.description = truncate_chars(&video.description, description_chars);
                video
            })
            .collect())
    }

    /// Records the rejection, then folds it into the user's criteria.
    ///
    /// The rejection is stored before anything else and stays stored whatever
    /// happens to the adaptation. Returns the criteria now in effect.
    pub async fn reject_video(
        &self,
        user_id: &str,
        video_id: &str,
        reason: Option<&str>,
        catalog: &dyn CatalogSource,
    ) -> AppResult<String> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        self.store.mark_rejected(user_id, video_id, reason).await?;
        tracing::info!(user_id = %user_id, video_id = %video_id, "Video rejected");

        let preferences = self.store.get_preferences(user_id).await?;
        let title = self.lookup_title(catalog, video_id).await;

        let updated = adaptation::adapt(
            self.oracle.as_ref(),
            &preferences.criteria_text,
            &title,
            reason,
        )
        .await;

        if updated != preferences.criteria_text {
            self.store
                .update_criteria(user_id, &updated, CriteriaSource::Adaptation)
                .await?;
            tracing::info!(user_id = %user_id, "Criteria adapted after rejection");
        }

        Ok(updated)
    }

    async fn lookup_title(&self, catalog: &dyn CatalogSource, video_id: &str) -> String {
        match catalog.resolve_details(&[video_id.to_string()]).await {
            Ok(videos) => videos
                .into_iter()
                .next()
                .map(|video| video.title)
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            Err(e) => {
                tracing::debug!(video_id = %video_id, error = %e, "Title lookup failed");
                UNKNOWN_TITLE.to_string()
            }
        }
    }

    pub async fn get_settings(&self, user_id: &str) -> AppResult<UserPreferences> {
        self.store.get_preferences(user_id).await
    }

    /// Stores trimmed criteria as a user edit. Blank text is rejected before
    /// touching the store.
    pub async fn update_settings(
        &self,
        user_id: &str,
        criteria_text: &str,
    ) -> AppResult<UserPreferences> {
        let criteria_text = UserPreferences::validate_criteria(criteria_text)?;
        self.store
            .update_criteria(user_id, &criteria_text, CriteriaSource::UserEdit)
            .await?;

        Ok(UserPreferences {
            user_id: user_id.to_string(),
            criteria_text,
            updated_by: CriteriaSource::UserEdit,
        })
    }

    pub async fn usage_stats(&self, user_id: &str) -> AppResult<UsageStats> {
        let used = self.quota.used(user_id).await?;
        let max_daily = self.quota.max_daily();
        Ok(UsageStats {
            refreshes_used: used,
            refreshes_remaining: max_daily.saturating_sub(used),
            max_daily,
        })
    }

    pub async fn rejection_history(&self, user_id: &str) -> AppResult<Vec<Rejection>> {
        self.store
            .get_rejections(user_id, self.settings.rejection_history_limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::AppError;
    use crate::models::{Page, DEFAULT_CRITERIA};
    use crate::services::oracle::MockOracle;
    use crate::services::providers::MockCatalogSource;
    use chrono::{Duration, Utc};

    fn video(id: &str) -> Video {
        Video {
            id: id.to_string(),
            title: format!("Title {}", id),
            channel_title: "Channel".to_string(),
            description: "x".repeat(400),
            thumbnail_url: None,
            published_at: Utc::now() - Duration::hours(1),
            duration_seconds: None,
            view_count: None,
        }
    }

    /// One channel whose upload collection holds `ids`, all long-form, with
    /// details for every id.
    fn catalog_with(ids: &'static [&'static str]) -> MockCatalogSource {
        let mut catalog = MockCatalogSource::new();
        catalog.expect_name().return_const("mock");
        catalog.expect_list_subscriptions().returning(|_| {
            Ok(Page {
                items: vec!["UC1".to_string()],
                next_page_token: None,
            })
        });
        catalog
            .expect_resolve_upload_collections()
            .returning(|_| Ok(vec!["UU1".to_string()]));
        catalog
            .expect_list_collection_items()
            .returning(move |_, _| Ok(ids.iter().map(|id| video(id)).collect()));
        catalog
            .expect_list_popular()
            .returning(|_, _| Ok(vec![]));
        catalog
            .expect_resolve_durations()
            .returning(|ids| Ok(ids.iter().map(|id| (id.clone(), 600)).collect()));
        catalog.expect_resolve_details().returning(|ids| {
            Ok(ids
                .iter()
                .rev()
                .map(|id| {
                    let mut detailed = video(id);
                    detailed.duration_seconds = Some(600);
                    detailed.view_count = Some(1_000);
                    detailed
                })
                .collect())
        });
        catalog
    }

    fn curator(store: Arc<MemoryStore>, oracle: MockOracle) -> Curator {
        Curator::new(store, Arc::new(oracle), CurationSettings::default())
    }

    #[tokio::test]
    async fn test_recommendations_follow_selection_order_and_record_shown() {
        let store = Arc::new(MemoryStore::new());
        let mut oracle = MockOracle::new();
        oracle
            .expect_complete()
            .returning(|_| Ok(r#"["v3","v1"]"#.to_string()));

        let catalog = catalog_with(&[
            "v1", "v2", "v3", "v4", "v5", "v6", "v7", "v8", "v9", "v10", "v11",
        ]);
        let curator = curator(store.clone(), oracle);

        let videos = curator.get_recommendations("u1", &catalog).await.unwrap();
        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v3", "v1", "v2", "v4", "v5", "v6", "v7", "v8", "v9", "v10"]);
        assert!(videos.iter().all(|v| v.description.chars().count() == 300));
        assert!(videos.iter().all(|v| v.view_count == Some(1_000)));

        let shown = store.get_shown_ids("u1").await.unwrap();
        assert_eq!(shown.len(), 10);
        assert!(!shown.contains("v11"));
    }

    #[tokio::test]
    async fn test_already_shown_videos_are_not_recommended_again() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_shown("u1", &["v1".to_string(), "v2".to_string()])
            .await
            .unwrap();

        let mut oracle = MockOracle::new();
        oracle.expect_complete().times(0);
        let catalog = catalog_with(&["v1", "v2", "v3"]);

        let videos = curator(store, oracle)
            .get_recommendations("u1", &catalog)
            .await
            .unwrap();
        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v3"]);
    }

    #[tokio::test]
    async fn test_recent_subscription_videos_include_shown() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_shown("u1", &["v1".to_string(), "v2".to_string()])
            .await
            .unwrap();

        let catalog = catalog_with(&["v1", "v2", "v3"]);
        let videos = curator(store, MockOracle::new())
            .get_recent_subscription_videos(&catalog)
            .await
            .unwrap();

        let mut ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["v1", "v2", "v3"]);
        assert!(videos.iter().all(|v| v.description.chars().count() == 200));
    }

    #[tokio::test]
    async fn test_refresh_denied_at_limit_without_pipeline() {
        let store = Arc::new(MemoryStore::new());
        let today = Utc::now().date_naive();
        for _ in 0..5 {
            store.increment_quota("u1", today, 5).await.unwrap();
        }

        let mut oracle = MockOracle::new();
        oracle.expect_complete().times(0);
        // No expectations: any catalog call fails the test
        let catalog = MockCatalogSource::new();

        let outcome = curator(store, oracle)
            .refresh_recommendations("u1", &catalog)
            .await
            .unwrap();
        assert!(matches!(outcome, RefreshOutcome::QuotaExceeded { max_daily: 5 }));
    }

    #[tokio::test]
    async fn test_refresh_reports_remaining() {
        let store = Arc::new(MemoryStore::new());
        let mut oracle = MockOracle::new();
        oracle.expect_complete().times(0);
        let catalog = catalog_with(&["v1", "v2"]);
        let curator = curator(store, oracle);

        let outcome = curator.refresh_recommendations("u1", &catalog).await.unwrap();
        match outcome {
            RefreshOutcome::Refreshed {
                videos,
                refreshes_remaining,
            } => {
                assert_eq!(videos.len(), 2);
                assert_eq!(refreshes_remaining, 4);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let stats = curator.usage_stats("u1").await.unwrap();
        assert_eq!(
            stats,
            UsageStats {
                refreshes_used: 1,
                refreshes_remaining: 4,
                max_daily: 5
            }
        );
    }

    #[tokio::test]
    async fn test_refresh_is_not_refunded_when_pipeline_fails() {
        let store = Arc::new(MemoryStore::new());
        let mut catalog = MockCatalogSource::new();
        catalog
            .expect_list_subscriptions()
            .returning(|_| Err(AppError::AuthExpired("401".to_string())));

        let curator = curator(store, MockOracle::new());
        let result = curator.refresh_recommendations("u1", &catalog).await;

        assert!(matches!(result, Err(AppError::AuthExpired(_))));
        assert_eq!(curator.usage_stats("u1").await.unwrap().refreshes_used, 1);
    }

    #[tokio::test]
    async fn test_reject_stores_then_adapts() {
        let store = Arc::new(MemoryStore::new());
        let mut oracle = MockOracle::new();
        oracle
            .expect_complete()
            .withf(|prompt| prompt.text.contains("\"Title v7\"") && prompt.text.contains("\"clickbait\""))
            .returning(|_| Ok("No clickbait.".to_string()));
        let catalog = catalog_with(&["v7"]);

        let curator = curator(store.clone(), oracle);
        let updated = curator
            .reject_video("u1", "v7", Some("  clickbait "), &catalog)
            .await
            .unwrap();
        assert_eq!(updated, "No clickbait.");

        let prefs = curator.get_settings("u1").await.unwrap();
        assert_eq!(prefs.criteria_text, "No clickbait.");
        assert_eq!(prefs.updated_by, CriteriaSource::Adaptation);

        let rejections = curator.rejection_history("u1").await.unwrap();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].reason.as_deref(), Some("clickbait"));
    }

    #[tokio::test]
    async fn test_reject_survives_adaptation_and_lookup_failure() {
        let store = Arc::new(MemoryStore::new());
        let mut oracle = MockOracle::new();
        oracle
            .expect_complete()
            .withf(|prompt| prompt.text.contains("\"Unknown video\""))
            .returning(|_| Err(AppError::Oracle("down".to_string())));
        let mut catalog = MockCatalogSource::new();
        catalog
            .expect_resolve_details()
            .returning(|_| Err(AppError::ExternalApi("503".to_string())));

        let curator = curator(store.clone(), oracle);
        let updated = curator
            .reject_video("u1", "gone", Some("   "), &catalog)
            .await
            .unwrap();
        assert_eq!(updated, DEFAULT_CRITERIA);

        let prefs = curator.get_settings("u1").await.unwrap();
        assert_eq!(prefs.updated_by, CriteriaSource::SystemDefault);

        let records = store.shown_records("u1").await;
        assert_eq!(records.len(), 1);
        assert!(records[0].was_rejected);
        assert_eq!(records[0].rejection_reason, None);
    }

    #[tokio::test]
    async fn test_rejecting_twice_keeps_one_record_with_latest_reason() {
        let store = Arc::new(MemoryStore::new());
        let mut oracle = MockOracle::new();
        oracle
            .expect_complete()
            .returning(|_| Err(AppError::Oracle("down".to_string())));
        let catalog = catalog_with(&["v1"]);
        let curator = curator(store.clone(), oracle);

        curator
            .reject_video("u1", "v1", Some("boring"), &catalog)
            .await
            .unwrap();
        curator
            .reject_video("u1", "v1", Some("too long"), &catalog)
            .await
            .unwrap();

        let records = store.shown_records("u1").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rejection_reason.as_deref(), Some("too long"));
    }

    #[tokio::test]
    async fn test_update_settings_trims_and_rejects_blank() {
        let curator = curator(Arc::new(MemoryStore::new()), MockOracle::new());

        let prefs = curator
            .update_settings("u1", "  Long-form science  ")
            .await
            .unwrap();
        assert_eq!(prefs.criteria_text, "Long-form science");
        assert_eq!(prefs.updated_by, CriteriaSource::UserEdit);

        let blank = curator.update_settings("u1", " \n ").await;
        assert!(matches!(blank, Err(AppError::InvalidInput(_))));
        assert_eq!(
            curator.get_settings("u1").await.unwrap().criteria_text,
            "Long-form science"
        );
    }
}
