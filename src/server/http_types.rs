use crate::domain::{
    Candidate, Conversation, MatchFilters, Profile, ProfileAttributes, SubscriptionLimits,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Serialize, ToSchema)]
pub(super) struct HealthResponse {
    pub(super) status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) error: Option<String>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct CreateProfileRequest {
    #[validate(length(min = 1, max = 128))]
    #[schema(example = "auth0|user-123")]
    pub(super) external_id: String,
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "Ada")]
    pub(super) display_name: String,
    #[schema(example = "basic")]
    pub(super) tier: String,
    /// With `age`, makes the profile matchable right away.
    #[schema(example = 29)]
    pub(super) age: Option<u8>,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub(super) statuses: Vec<String>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct AttributesRequest {
    #[schema(example = 29)]
    pub(super) age: u8,
    #[serde(default)]
    #[validate(length(max = 32))]
    #[schema(example = json!(["verified", "homeowner"]))]
    pub(super) statuses: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct ToggleStatusRequest {
    #[schema(example = "verified")]
    pub(super) status: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct TierRequest {
    #[schema(example = "elite")]
    pub(super) tier: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct MaxDistanceRequest {
    #[validate(range(min = 1))]
    #[schema(example = 25)]
    pub(super) max_distance: u32,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct AgeRangeRequest {
    #[schema(example = 25)]
    pub(super) min: u8,
    #[schema(example = 40)]
    pub(super) max: u8,
}

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct AdvancedFiltersRequest {
    pub(super) height_min: Option<u16>,
    pub(super) height_max: Option<u16>,
    #[schema(example = "athletic")]
    pub(super) body_preference: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub(super) ethnicity: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct StartConversationRequest {
    pub(super) partner_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub(super) struct ProfileResponse {
    pub(super) id: Uuid,
    pub(super) external_id: String,
    pub(super) display_name: String,
    pub(super) subscription_tier: String,
    pub(super) created_at: chrono::DateTime<chrono::Utc>,
    pub(super) updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            external_id: profile.external_id,
            display_name: profile.display_name,
            subscription_tier: profile.subscription_tier.to_string(),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct AttributesResponse {
    pub(super) age: u8,
    pub(super) statuses: Vec<String>,
}

impl From<ProfileAttributes> for AttributesResponse {
    fn from(attributes: ProfileAttributes) -> Self {
        Self {
            age: attributes.age(),
            statuses: attributes.statuses().iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct FiltersResponse {
    pub(super) max_distance: u32,
    pub(super) selected_statuses: Vec<String>,
    pub(super) age_min: u8,
    pub(super) age_max: u8,
    pub(super) height_min: Option<u16>,
    pub(super) height_max: Option<u16>,
    pub(super) body_preference: Option<String>,
    pub(super) ethnicity: Option<String>,
    pub(super) allowed_tiers: Vec<String>,
}

impl From<MatchFilters> for FiltersResponse {
    fn from(filters: MatchFilters) -> Self {
        Self {
            max_distance: filters.max_distance,
            selected_statuses: filters.selected_statuses.into_iter().map(String::from).collect(),
            age_min: filters.age_range.min(),
            age_max: filters.age_range.max(),
            height_min: filters.height.map(|h| h.min()),
            height_max: filters.height.map(|h| h.max()),
            body_preference: filters.body_preference.map(|b| b.to_string()),
            ethnicity: filters.ethnicity,
            allowed_tiers: filters.allowed_tiers.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct LimitsResponse {
    pub(super) tier: String,
    pub(super) max_distance: u32,
    pub(super) max_statuses: usize,
    pub(super) daily_matches: usize,
    pub(super) daily_conversations: u32,
    pub(super) allowed_match_tiers: Vec<String>,
    pub(super) has_advanced_filters: bool,
}

impl From<SubscriptionLimits> for LimitsResponse {
    fn from(limits: SubscriptionLimits) -> Self {
        Self {
            tier: limits.tier.to_string(),
            max_distance: limits.max_distance,
            max_statuses: limits.max_statuses,
            daily_matches: limits.daily_matches,
            daily_conversations: limits.daily_conversations,
            allowed_match_tiers: limits
                .allowed_match_tiers
                .iter()
                .map(ToString::to_string)
                .collect(),
            has_advanced_filters: limits.has_advanced_filters,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct CandidateResponse {
    pub(super) id: Uuid,
    pub(super) display_name: String,
    pub(super) tier: String,
    pub(super) age: u8,
    pub(super) statuses: Vec<String>,
    pub(super) last_active_at: chrono::DateTime<chrono::Utc>,
}

impl From<Candidate> for CandidateResponse {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            display_name: candidate.display_name,
            tier: candidate.tier.to_string(),
            age: candidate.age,
            statuses: candidate.statuses.into_iter().map(String::from).collect(),
            last_active_at: candidate.last_active_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct ConversationResponse {
    pub(super) id: Uuid,
    pub(super) initiator_id: Uuid,
    pub(super) partner_id: Uuid,
    pub(super) started_at: chrono::DateTime<chrono::Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(conversation: Conversation) -> Self {
        Self {
            id: conversation.id,
            initiator_id: conversation.initiator_id,
            partner_id: conversation.partner_id,
            started_at: conversation.started_at,
        }
    }
}
