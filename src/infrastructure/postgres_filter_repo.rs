use crate::domain::{MatchFilters, SubscriptionTier};
use crate::infrastructure::repository::{filters_from_json, filters_to_json, parse_tier};
use crate::infrastructure::{FilterRepository, RepositoryError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct PostgresFilterRepository {
    pool: PgPool,
}

impl PostgresFilterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FilterRepository for PostgresFilterRepository {
    async fn get(&self, profile_id: Uuid) -> Result<Option<MatchFilters>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT filters
            FROM match_filters
            WHERE profile_id = $1
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(filters_from_json(row.try_get("filters")?)?)),
            None => Ok(None),
        }
    }

    async fn save_if_tier(
        &self,
        profile_id: Uuid,
        tier: SubscriptionTier,
        filters: &MatchFilters,
    ) -> Result<bool, RepositoryError> {
        let filters_json = filters_to_json(filters)?;
        let mut tx = self.pool.begin().await?;

        // Tier changes update this row first, so holding its lock orders the
        // two writers.
        let current: Option<String> = sqlx::query_scalar(
            r#"
            SELECT subscription_tier
            FROM profiles
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&mut *tx)
        .await?;

        let current = match current {
            Some(current) => parse_tier(&current)?,
            None => return Err(RepositoryError::NotFound(format!("Profile {}", profile_id))),
        };
        if current != tier {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO match_filters (profile_id, filters, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (profile_id)
            DO UPDATE SET filters = EXCLUDED.filters, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(profile_id)
        .bind(filters_json)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, profile_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            DELETE FROM match_filters
            WHERE profile_id = $1
            "#,
        )
        .bind(profile_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
