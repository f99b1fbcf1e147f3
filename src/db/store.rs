use chrono::NaiveDate;
use std::collections::HashSet;

use crate::{
    error::AppResult,
    models::{CriteriaSource, Rejection, UserPreferences},
};

/// Durable records the curation pipeline reads and writes.
///
/// Every mutating method is a single atomic operation in the backing store;
/// callers never read-modify-write across an await point.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Stored preferences, or the system default when none exist yet
    async fn get_preferences(&self, user_id: &str) -> AppResult<UserPreferences>;

    async fn update_criteria(
        &self,
        user_id: &str,
        criteria_text: &str,
        source: CriteriaSource,
    ) -> AppResult<()>;

    /// Ids of every video ever surfaced to the user, rejected or not
    async fn get_shown_ids(&self, user_id: &str) -> AppResult<HashSet<String>>;

    /// Rejections, most recently rejected first
    async fn get_rejections(&self, user_id: &str, limit: i64) -> AppResult<Vec<Rejection>>;

    /// Records videos as shown; existing records are left untouched
    async fn upsert_shown(&self, user_id: &str, video_ids: &[String]) -> AppResult<()>;

    /// Flags a video as rejected, creating its shown record if needed.
    /// A repeated rejection overwrites the reason in place.
    async fn mark_rejected(
        &self,
        user_id: &str,
        video_id: &str,
        reason: Option<&str>,
    ) -> AppResult<()>;

    async fn get_quota_count(&self, user_id: &str, date: NaiveDate) -> AppResult<u32>;

    /// Atomically increments the user-day counter unless it already reached
    /// `max`. Returns the new count, or `None` when nothing was granted.
    async fn increment_quota(
        &self,
        user_id: &str,
        date: NaiveDate,
        max: u32,
    ) -> AppResult<Option<u32>>;
}
