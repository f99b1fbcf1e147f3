use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    db::RecordStore,
    error::AppResult,
    models::{CriteriaSource, Rejection, ShownRecord, UserPreferences},
};

/// In-process record store.
///
/// Each operation holds the write lock for its whole duration, which gives the
/// same single-operation atomicity the Postgres store gets from its upserts.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    preferences: HashMap<String, UserPreferences>,
    shown: HashMap<(String, String), StoredShown>,
    quotas: HashMap<(String, NaiveDate), u32>,
    /// Monotonic sequence used to order rejections
    rejection_seq: u64,
}

struct StoredShown {
    record: ShownRecord,
    rejected_seq: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one user's shown records, for inspection
    pub async fn shown_records(&self, user_id: &str) -> Vec<ShownRecord> {
        let inner = self.inner.read().await;
        inner
            .shown
            .values()
            .filter(|s| s.record.user_id == user_id)
            .map(|s| s.record.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn get_preferences(&self, user_id: &str) -> AppResult<UserPreferences> {
        let inner = self.inner.read().await;
        Ok(inner
            .preferences
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserPreferences::system_default(user_id)))
    }

    async fn update_criteria(
        &self,
        user_id: &str,
        criteria_text: &str,
        source: CriteriaSource,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.preferences.insert(
            user_id.to_string(),
            UserPreferences {
                user_id: user_id.to_string(),
                criteria_text: criteria_text.to_string(),
                updated_by: source,
            },
        );
        Ok(())
    }

    async fn get_shown_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .shown
            .keys()
            .filter(|(user, _)| user == user_id)
            .map(|(_, video)| video.clone())
            .collect())
    }

    async fn get_rejections(&self, user_id: &str, limit: i64) -> AppResult<Vec<Rejection>> {
        let inner = self.inner.read().await;
        let mut rejected: Vec<&StoredShown> = inner
            .shown
            .values()
            .filter(|s| s.record.user_id == user_id && s.record.was_rejected)
            .collect();
        rejected.sort_by(|a, b| b.rejected_seq.cmp(&a.rejected_seq));

        Ok(rejected
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|s| Rejection {
                video_id: s.record.video_id.clone(),
                reason: s.record.rejection_reason.clone(),
                shown_date: s.record.shown_date,
            })
            .collect())
    }

    async fn upsert_shown(&self, user_id: &str, video_ids: &[String]) -> AppResult<()> {
        let today = Utc::now().date_naive();
        let mut inner = self.inner.write().await;
        for video_id in video_ids {
            inner
                .shown
                .entry((user_id.to_string(), video_id.clone()))
                .or_insert_with(|| StoredShown {
                    record: ShownRecord {
                        user_id: user_id.to_string(),
                        video_id: video_id.clone(),
                        shown_date: today,
                        was_rejected: false,
                        rejection_reason: None,
                    },
                    rejected_seq: 0,
                });
        }
        Ok(())
    }

    async fn mark_rejected(
        &self,
        user_id: &str,
        video_id: &str,
        reason: Option<&str>,
    ) -> AppResult<()> {
        let today = Utc::now().date_naive();
        let mut inner = self.inner.write().await;
        inner.rejection_seq += 1;
        let seq = inner.rejection_seq;

        let stored = inner
            .shown
            .entry((user_id.to_string(), video_id.to_string()))
            .or_insert_with(|| StoredShown {
                record: ShownRecord {
                    user_id: user_id.to_string(),
                    video_id: video_id.to_string(),
                    shown_date: today,
                    was_rejected: false,
                    rejection_reason: None,
                },
                rejected_seq: 0,
            });
        stored.record.was_rejected = true;
        stored.record.rejection_reason = reason.map(str::to_string);
        stored.rejected_seq = seq;
        Ok(())
    }

    async fn get_quota_count(&self, user_id: &str, date: NaiveDate) -> AppResult<u32> {
        let inner = self.inner.read().await;
        Ok(inner
            .quotas
            .get(&(user_id.to_string(), date))
            .copied()
            .unwrap_or(0))
    }

    async fn increment_quota(
        &self,
        user_id: &str,
        date: NaiveDate,
        max: u32,
    ) -> AppResult<Option<u32>> {
        let mut inner = self.inner.write().await;
        let count = inner.quotas.entry((user_id.to_string(), date)).or_insert(0);
        if *count >= max {
            return Ok(None);
        }
        *count += 1;
        Ok(Some(*count))
    }
}
