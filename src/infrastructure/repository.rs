use crate::domain::{
    check_conversation_start, Candidate, CandidateQuery, Conversation, MatchFilters, Profile,
    ProfileAttributes, StatusBadge, SubscriptionTier, TierGateRefusal,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Outcome of an allowance-checked conversation insert.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationSlot {
    Started { started_today: u32 },
    Refused(TierGateRefusal),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn create(&self, profile: &Profile) -> Result<(), RepositoryError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Profile, RepositoryError>;
    async fn get_by_external_id(&self, external_id: &str) -> Result<Profile, RepositoryError>;
    async fn update_attributes(
        &self,
        id: Uuid,
        attributes: &ProfileAttributes,
    ) -> Result<(), RepositoryError>;
    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError>;
    /// Writes the new tier and the filters clamped to it in one unit, so no
    /// reader sees the new tier next to over-limit filters.
    async fn update_subscription_with_filters(
        &self,
        id: Uuid,
        tier: SubscriptionTier,
        filters: &MatchFilters,
    ) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait FilterRepository: Send + Sync {
    async fn get(&self, profile_id: Uuid) -> Result<Option<MatchFilters>, RepositoryError>;
    /// Stores `filters` only while the profile is still on `tier`, serialized
    /// against tier changes. Returns `false` when the tier moved underneath.
    async fn save_if_tier(
        &self,
        profile_id: Uuid,
        tier: SubscriptionTier,
        filters: &MatchFilters,
    ) -> Result<bool, RepositoryError>;
    async fn delete(&self, profile_id: Uuid) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    /// Candidates admitted by `query`, excluding `profile_id` itself, in a
    /// stable order. `query.limit` applies after the query's predicates.
    async fn list_pool(
        &self,
        profile_id: Uuid,
        query: &CandidateQuery,
    ) -> Result<Vec<Candidate>, RepositoryError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Counts the initiator's conversations started since `since` and inserts
    /// `conversation` when `tier` allows another, as one unit per initiator.
    async fn create_within_allowance(
        &self,
        conversation: &Conversation,
        since: DateTime<Utc>,
        tier: SubscriptionTier,
    ) -> Result<ConversationSlot, RepositoryError>;
}

pub(crate) fn parse_tier(tier: &str) -> Result<SubscriptionTier, RepositoryError> {
    SubscriptionTier::from_str(tier)
        .map_err(|_| RepositoryError::InvalidData(format!("Unknown tier: {}", tier)))
}

pub(crate) fn filters_to_json(filters: &MatchFilters) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(filters)
        .map_err(|e| RepositoryError::InvalidData(format!("Failed to serialize filters: {}", e)))
}

pub(crate) fn filters_from_json(value: serde_json::Value) -> Result<MatchFilters, RepositoryError> {
    serde_json::from_value(value)
        .map_err(|e| RepositoryError::InvalidData(format!("Failed to parse filters: {}", e)))
}

pub struct PostgresProfileRepository {
    pool: PgPool,
}

impl PostgresProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn create(&self, profile: &Profile) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, external_id, display_name, subscription_tier, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(profile.id)
        .bind(&profile.external_id)
        .bind(&profile.display_name)
        .bind(profile.subscription_tier.to_string())
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => RepositoryError::Conflict(
                format!("Profile with external ID {} already exists", profile.external_id),
            ),
            _ => RepositoryError::DatabaseError(e),
        })?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Profile, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id, display_name, subscription_tier, created_at, updated_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(format!("Profile {}", id)),
            _ => RepositoryError::DatabaseError(e),
        })?;

        row_to_profile(&row)
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Profile, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id, display_name, subscription_tier, created_at, updated_at
            FROM profiles
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                RepositoryError::NotFound(format!("Profile {}", external_id))
            }
            _ => RepositoryError::DatabaseError(e),
        })?;

        row_to_profile(&row)
    }

    async fn update_attributes(
        &self,
        id: Uuid,
        attributes: &ProfileAttributes,
    ) -> Result<(), RepositoryError> {
        let statuses = serde_json::to_value(attributes.statuses())
            .map_err(|e| RepositoryError::InvalidData(format!("Failed to serialize statuses: {}", e)))?;

        let updated = sqlx::query(
            r#"
            UPDATE profiles
            SET age = $1, statuses = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(i16::from(attributes.age()))
        .bind(statuses)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Profile {}", id)));
        }
        Ok(())
    }

    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let updated = sqlx::query(
            r#"
            UPDATE profiles
            SET last_active_at = GREATEST(COALESCE(last_active_at, $1), $1)
            WHERE id = $2
            "#,
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Profile {}", id)));
        }
        Ok(())
    }

    async fn update_subscription_with_filters(
        &self,
        id: Uuid,
        tier: SubscriptionTier,
        filters: &MatchFilters,
    ) -> Result<(), RepositoryError> {
        let filters_json = filters_to_json(filters)?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE profiles
            SET subscription_tier = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(tier.to_string())
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Profile {}", id)));
        }

        sqlx::query(
            r#"
            INSERT INTO match_filters (profile_id, filters, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (profile_id)
            DO UPDATE SET filters = EXCLUDED.filters, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(id)
        .bind(filters_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn row_to_profile(row: &sqlx::postgres::PgRow) -> Result<Profile, RepositoryError> {
    let tier_str: String = row.try_get("subscription_tier")?;

    Ok(Profile {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        display_name: row.try_get("display_name")?,
        subscription_tier: parse_tier(&tier_str)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct PostgresCandidateRepository {
    pool: PgPool,
}

impl PostgresCandidateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandidateRepository for PostgresCandidateRepository {
    async fn list_pool(
        &self,
        profile_id: Uuid,
        query: &CandidateQuery,
    ) -> Result<Vec<Candidate>, RepositoryError> {
        let tiers: Vec<String> = query.allowed_tiers.iter().map(ToString::to_string).collect();
        let statuses: Vec<String> = query.statuses.iter().map(ToString::to_string).collect();

        let rows = sqlx::query(
            r#"
            SELECT id, display_name, subscription_tier, age, statuses, last_active_at
            FROM profiles
            WHERE id <> $1
              AND last_active_at >= $2
              AND subscription_tier = ANY($3)
              AND age BETWEEN $4 AND $5
              AND (cardinality($6::text[]) = 0 OR jsonb_exists_any(statuses, $6::text[]))
            ORDER BY created_at ASC, id ASC
            LIMIT $7
            "#,
        )
        .bind(profile_id)
        .bind(query.active_since)
        .bind(tiers)
        .bind(i16::from(query.age_range.min()))
        .bind(i16::from(query.age_range.max()))
        .bind(statuses)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_candidate).collect()
    }
}

fn row_to_candidate(row: &sqlx::postgres::PgRow) -> Result<Candidate, RepositoryError> {
    let tier_str: String = row.try_get("subscription_tier")?;
    let age: i16 = row.try_get("age")?;
    let statuses_json: serde_json::Value = row.try_get("statuses")?;
    let statuses: Vec<StatusBadge> = serde_json::from_value(statuses_json)
        .map_err(|e| RepositoryError::InvalidData(format!("Invalid statuses: {}", e)))?;

    Ok(Candidate {
        id: row.try_get("id")?,
        display_name: row.try_get("display_name")?,
        tier: parse_tier(&tier_str)?,
        age: u8::try_from(age)
            .map_err(|_| RepositoryError::InvalidData(format!("Invalid age: {}", age)))?,
        statuses,
        last_active_at: row.try_get("last_active_at")?,
    })
}

pub struct PostgresConversationRepository {
    pool: PgPool,
}

impl PostgresConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    async fn create_within_allowance(
        &self,
        conversation: &Conversation,
        since: DateTime<Utc>,
        tier: SubscriptionTier,
    ) -> Result<ConversationSlot, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the initiator serializes concurrent starts.
        sqlx::query("SELECT id FROM profiles WHERE id = $1 FOR UPDATE")
            .bind(conversation.initiator_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("Profile {}", conversation.initiator_id))
            })?;

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM conversations
            WHERE initiator_id = $1 AND started_at >= $2
            "#,
        )
        .bind(conversation.initiator_id)
        .bind(since)
        .fetch_one(&mut *tx)
        .await?;
        let started_today = u32::try_from(count).unwrap_or(u32::MAX);

        if let Err(refusal) = check_conversation_start(started_today, tier) {
            tx.rollback().await?;
            return Ok(ConversationSlot::Refused(refusal));
        }

        sqlx::query(
            r#"
            INSERT INTO conversations (id, initiator_id, partner_id, started_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(conversation.id)
        .bind(conversation.initiator_id)
        .bind(conversation.partner_id)
        .bind(conversation.started_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ConversationSlot::Started {
            started_today: started_today.saturating_add(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tier_rejects_unknown_values() {
        assert_eq!(parse_tier("star").unwrap(), SubscriptionTier::Star);
        assert!(matches!(
            parse_tier("gold"),
            Err(RepositoryError::InvalidData(msg)) if msg.contains("gold")
        ));
    }

    #[test]
    fn filters_json_round_trip_preserves_status_order() {
        let mut filters = MatchFilters::defaults_for(SubscriptionTier::Elite);
        filters.selected_statuses = vec![
            StatusBadge::new("verified").unwrap(),
            StatusBadge::new("athlete").unwrap(),
        ];

        let restored = filters_from_json(filters_to_json(&filters).unwrap()).unwrap();
        assert_eq!(restored, filters);
    }

    #[test]
    fn filters_from_json_rejects_malformed_age_range() {
        let mut value = filters_to_json(&MatchFilters::defaults_for(SubscriptionTier::Basic)).unwrap();
        value["age_range"] = serde_json::json!({ "min": 60, "max": 20 });

        assert!(matches!(
            filters_from_json(value),
            Err(RepositoryError::InvalidData(_))
        ));
    }

    #[test]
    fn filters_from_json_rejects_repeated_statuses() {
        let mut value = filters_to_json(&MatchFilters::defaults_for(SubscriptionTier::Star)).unwrap();
        value["selected_statuses"] = serde_json::json!(["verified", "verified"]);

        assert!(matches!(
            filters_from_json(value),
            Err(RepositoryError::InvalidData(msg)) if msg.contains("more than once")
        ));
    }
}
