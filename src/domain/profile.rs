use super::filters::{ensure_distinct_statuses, FilterError, StatusBadge, MAX_AGE, MIN_AGE};
use super::tier::SubscriptionTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    /// Subject issued by the auth provider.
    pub external_id: String,
    pub display_name: String,
    pub subscription_tier: SubscriptionTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(external_id: String, display_name: String, tier: SubscriptionTier) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            external_id,
            display_name,
            subscription_tier: tier,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What other users match against: the profile's age and its status badges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileAttributes {
    age: u8,
    statuses: Vec<StatusBadge>,
}

impl ProfileAttributes {
    pub fn new(age: u8, statuses: Vec<StatusBadge>) -> Result<Self, FilterError> {
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            return Err(FilterError::InvalidAge(age));
        }
        ensure_distinct_statuses(&statuses)?;
        Ok(Self { age, statuses })
    }

    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn statuses(&self) -> &[StatusBadge] {
        &self.statuses
    }
}

/// A conversation opened by `initiator_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: Uuid,
    pub initiator_id: Uuid,
    pub partner_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(initiator_id: Uuid, partner_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            initiator_id,
            partner_id,
            started_at,
        }
    }
}
