use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use crate::{db::RecordStore, error::AppResult, models::RefreshQuota};

/// Result of one attempt to spend a daily refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub granted: bool,
    /// Today's count after the attempt
    pub used: u32,
    pub remaining: u32,
}

/// Per-user, per-day refresh budget
#[derive(Clone)]
pub struct QuotaGate {
    store: Arc<dyn RecordStore>,
    max_daily: u32,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn RecordStore>, max_daily: u32) -> Self {
        Self { store, max_daily }
    }

    pub fn max_daily(&self) -> u32 {
        self.max_daily
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Spends one refresh for today if any are left.
    ///
    /// A user already at the limit is denied without touching the counter.
    /// Otherwise the increment is a single conditional store operation, so
    /// concurrent attempts cannot push the count past the limit.
    pub async fn try_consume(&self, user_id: &str) -> AppResult<QuotaDecision> {
        let today = Self::today();

        let current = self.store.get_quota_count(user_id, today).await?;
        if current >= self.max_daily {
            return Ok(self.denied(current));
        }

        match self
            .store
            .increment_quota(user_id, today, self.max_daily)
            .await?
        {
            Some(count) => {
                tracing::info!(user_id = %user_id, used = count, max = self.max_daily, "Refresh granted");
                Ok(QuotaDecision {
                    granted: true,
                    used: count,
                    remaining: self.max_daily.saturating_sub(count),
                })
            }
            // Lost a race against a concurrent refresh
            None => Ok(self.denied(self.max_daily)),
        }
    }

    fn denied(&self, used: u32) -> QuotaDecision {
        QuotaDecision {
            granted: false,
            used,
            remaining: 0,
        }
    }

    /// Today's counter for the user; zero when no refresh happened yet
    pub async fn current(&self, user_id: &str) -> AppResult<RefreshQuota> {
        let date = Self::today();
        let count = self.store.get_quota_count(user_id, date).await?;
        Ok(RefreshQuota {
            user_id: user_id.to_string(),
            date,
            count,
        })
    }

    pub async fn used(&self, user_id: &str) -> AppResult<u32> {
        Ok(self.current(user_id).await?.count)
    }

    pub async fn remaining(&self, user_id: &str) -> AppResult<u32> {
        Ok(self.max_daily.saturating_sub(self.used(user_id).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn test_five_grants_then_denied() {
        let gate = QuotaGate::new(Arc::new(MemoryStore::new()), 5);

        for expected in 1..=5 {
            let decision = gate.try_consume("u1").await.unwrap();
            assert!(decision.granted);
            assert_eq!(decision.used, expected);
            assert_eq!(decision.remaining, 5 - expected);
        }

        let sixth = gate.try_consume("u1").await.unwrap();
        assert!(!sixth.granted);
        assert_eq!(sixth.remaining, 0);
        assert_eq!(gate.remaining("u1").await.unwrap(), 0);
        assert_eq!(gate.used("u1").await.unwrap(), 5);

        let quota = gate.current("u1").await.unwrap();
        assert_eq!(quota.date, Utc::now().date_naive());
        assert_eq!(quota.count, 5);
    }

    #[tokio::test]
    async fn test_users_have_separate_budgets() {
        let gate = QuotaGate::new(Arc::new(MemoryStore::new()), 2);

        gate.try_consume("u1").await.unwrap();
        gate.try_consume("u1").await.unwrap();

        assert_eq!(gate.remaining("u1").await.unwrap(), 0);
        assert_eq!(gate.remaining("u2").await.unwrap(), 2);
        assert!(gate.try_consume("u2").await.unwrap().granted);
    }

    #[tokio::test]
    async fn test_concurrent_attempts_never_exceed_max() {
        let gate = QuotaGate::new(Arc::new(MemoryStore::new()), 3);

        let attempts = (0..10).map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.try_consume("u1").await.unwrap() })
        });
        let decisions = futures::future::join_all(attempts).await;

        let granted = decisions
            .into_iter()
            .map(|d| d.unwrap())
            .filter(|d| d.granted)
            .count();
        assert_eq!(granted, 3);
        assert_eq!(gate.used("u1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_zero_budget_always_denies() {
        let gate = QuotaGate::new(Arc::new(MemoryStore::new()), 0);
        let decision = gate.try_consume("u1").await.unwrap();
        assert!(!decision.granted);
        assert_eq!(gate.used("u1").await.unwrap(), 0);
    }
}
