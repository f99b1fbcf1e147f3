use chrono::{NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::collections::HashSet;

use crate::{
    db::RecordStore,
    error::AppResult,
    models::{CriteriaSource, Rejection, UserPreferences},
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Record store backed by Postgres
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecordStore for PgRecordStore {
    async fn get_preferences(&self, user_id: &str) -> AppResult<UserPreferences> {
        let row = sqlx::query(
            r#"
            SELECT criteria_text, updated_by
            FROM user_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let updated_by: String = row.try_get("updated_by")?;
                Ok(UserPreferences {
                    user_id: user_id.to_string(),
                    criteria_text: row.try_get("criteria_text")?,
                    updated_by: updated_by.parse()?,
                })
            }
            None => Ok(UserPreferences::system_default(user_id)),
        }
    }

    async fn update_criteria(
        &self,
        user_id: &str,
        criteria_text: &str,
        source: CriteriaSource,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, criteria_text, updated_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
                SET criteria_text = EXCLUDED.criteria_text,
                    updated_by = EXCLUDED.updated_by,
                    updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(criteria_text)
        .bind(source.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_shown_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT video_id FROM shown_videos WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().collect())
    }

    async fn get_rejections(&self, user_id: &str, limit: i64) -> AppResult<Vec<Rejection>> {
        let rows = sqlx::query(
            r#"
            SELECT video_id, rejection_reason, shown_date
            FROM shown_videos
            WHERE user_id = $1 AND was_rejected = true
            ORDER BY rejected_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> AppResult<Rejection> {
                Ok(Rejection {
                    video_id: row.try_get("video_id")?,
                    reason: row.try_get("rejection_reason")?,
                    shown_date: row.try_get("shown_date")?,
                })
            })
            .collect()
    }

    async fn upsert_shown(&self, user_id: &str, video_ids: &[String]) -> AppResult<()> {
        if video_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO shown_videos (user_id, video_id, shown_date)
            SELECT $1, video_id, $3
            FROM UNNEST($2::text[]) AS video_id
            ON CONFLICT (user_id, video_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(video_ids)
        .bind(Utc::now().date_naive())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_rejected(
        &self,
        user_id: &str,
        video_id: &str,
        reason: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shown_videos
                (user_id, video_id, shown_date, was_rejected, rejection_reason, rejected_at)
            VALUES ($1, $2, $3, true, $4, now())
            ON CONFLICT (user_id, video_id) DO UPDATE
                SET was_rejected = true,
                    rejection_reason = EXCLUDED.rejection_reason,
                    rejected_at = now()
            "#,
        )
        .bind(user_id)
        .bind(video_id)
        .bind(Utc::now().date_naive())
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_quota_count(&self, user_id: &str, date: NaiveDate) -> AppResult<u32> {
        let count: Option<i32> = sqlx::query_scalar(
            "SELECT refresh_count FROM daily_refreshes WHERE user_id = $1 AND refresh_date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.unwrap_or(0).max(0) as u32)
    }

    async fn increment_quota(
        &self,
        user_id: &str,
        date: NaiveDate,
        max: u32,
    ) -> AppResult<Option<u32>> {
        // The WHERE on the conflict branch makes check and increment one statement
        let count: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO daily_refreshes (user_id, refresh_date, refresh_count)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, refresh_date) DO UPDATE
                SET refresh_count = daily_refreshes.refresh_count + 1
                WHERE daily_refreshes.refresh_count < $3
            RETURNING refresh_count
            "#,
        )
        .bind(user_id)
        .bind(date)
        .bind(max as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.map(|c| c.max(0) as u32))
    }
}
