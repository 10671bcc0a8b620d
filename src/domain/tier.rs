use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

/// Subscription level reported by the purchase provider.
///
/// Variants are declared lowest first, so the derived `Ord` is the upgrade order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionTier {
    Basic,
    Elite,
    Star,
}

impl SubscriptionTier {
    pub fn display_name(&self) -> &'static str {
        match self {
            SubscriptionTier::Basic => "Basic",
            SubscriptionTier::Elite => "Elite",
            SubscriptionTier::Star => "Star",
        }
    }

    pub fn limits(&self) -> SubscriptionLimits {
        limits_for(*self)
    }

    /// Lowest tier whose members may be matched with `candidate` members.
    pub fn required_for(candidate: SubscriptionTier) -> SubscriptionTier {
        SubscriptionTier::iter()
            .find(|tier| can_select_match_tier(candidate, *tier))
            .unwrap_or(SubscriptionTier::Star)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionLimits {
    pub tier: SubscriptionTier,
    /// Search radius in miles.
    pub max_distance: u32,
    pub max_statuses: usize,
    pub daily_matches: usize,
    pub daily_conversations: u32,
    pub allowed_match_tiers: BTreeSet<SubscriptionTier>,
    pub has_advanced_filters: bool,
}

/// Static limits table.
///
/// | Tier  | Distance | Statuses | Matches/day | Conversations/day | Match tiers         | Advanced |
/// |-------|----------|----------|-------------|-------------------|---------------------|----------|
/// | Basic | 50       | 5        | 5           | 3                 | basic               | No       |
/// | Elite | 100      | 8        | 15          | 10                | basic, elite        | Yes      |
/// | Star  | 200      | 15       | 30          | 25                | basic, elite, star  | Yes      |
pub fn limits_for(tier: SubscriptionTier) -> SubscriptionLimits {
    use SubscriptionTier::*;

    match tier {
        Basic => SubscriptionLimits {
            tier,
            max_distance: 50,
            max_statuses: 5,
            daily_matches: 5,
            daily_conversations: 3,
            allowed_match_tiers: BTreeSet::from([Basic]),
            has_advanced_filters: false,
        },
        Elite => SubscriptionLimits {
            tier,
            max_distance: 100,
            max_statuses: 8,
            daily_matches: 15,
            daily_conversations: 10,
            allowed_match_tiers: BTreeSet::from([Basic, Elite]),
            has_advanced_filters: true,
        },
        Star => SubscriptionLimits {
            tier,
            max_distance: 200,
            max_statuses: 15,
            daily_matches: 30,
            daily_conversations: 25,
            allowed_match_tiers: BTreeSet::from([Basic, Elite, Star]),
            has_advanced_filters: true,
        },
    }
}

/// A request the user's tier does not permit. `Display` is the user-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TierGateRefusal {
    #[error("You can select up to {max} statuses with your {} subscription", .tier.display_name())]
    StatusLimit { max: usize, tier: SubscriptionTier },
    #[error(
        "Upgrade to {} to match with {} members",
        .required.display_name(),
        .candidate.display_name()
    )]
    MatchTierLocked {
        candidate: SubscriptionTier,
        required: SubscriptionTier,
    },
    #[error("Your {} subscription allows a search radius of up to {max} miles", .tier.display_name())]
    DistanceLimit { max: u32, tier: SubscriptionTier },
    #[error(
        "Advanced filters are not available with your {} subscription. Upgrade to {} to unlock them",
        .tier.display_name(),
        .required.display_name()
    )]
    AdvancedFiltersLocked {
        tier: SubscriptionTier,
        required: SubscriptionTier,
    },
    #[error("You can start up to {max} conversations per day with your {} subscription", .tier.display_name())]
    ConversationLimit { max: u32, tier: SubscriptionTier },
}

impl TierGateRefusal {
    /// Stable machine-readable kind for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            TierGateRefusal::StatusLimit { .. } => "status_limit",
            TierGateRefusal::MatchTierLocked { .. } => "match_tier_locked",
            TierGateRefusal::DistanceLimit { .. } => "distance_limit",
            TierGateRefusal::AdvancedFiltersLocked { .. } => "advanced_filters_locked",
            TierGateRefusal::ConversationLimit { .. } => "conversation_limit",
        }
    }
}

/// Deselecting is always allowed; selecting requires room under the tier cap.
pub fn can_select_status<T: PartialEq>(current: &[T], candidate: &T, tier: SubscriptionTier) -> bool {
    current.contains(candidate) || current.len() < limits_for(tier).max_statuses
}

pub fn check_status_selection<T: PartialEq>(
    current: &[T],
    candidate: &T,
    tier: SubscriptionTier,
) -> Result<(), TierGateRefusal> {
    if can_select_status(current, candidate, tier) {
        Ok(())
    } else {
        Err(TierGateRefusal::StatusLimit {
            max: limits_for(tier).max_statuses,
            tier,
        })
    }
}

pub fn can_select_match_tier(candidate: SubscriptionTier, user_tier: SubscriptionTier) -> bool {
    limits_for(user_tier).allowed_match_tiers.contains(&candidate)
}

pub fn check_match_tier_selection(
    candidate: SubscriptionTier,
    user_tier: SubscriptionTier,
) -> Result<(), TierGateRefusal> {
    if can_select_match_tier(candidate, user_tier) {
        Ok(())
    } else {
        Err(TierGateRefusal::MatchTierLocked {
            candidate,
            required: SubscriptionTier::required_for(candidate),
        })
    }
}

pub fn check_max_distance(miles: u32, tier: SubscriptionTier) -> Result<(), TierGateRefusal> {
    let max = limits_for(tier).max_distance;
    if miles <= max {
        Ok(())
    } else {
        Err(TierGateRefusal::DistanceLimit { max, tier })
    }
}

pub fn check_advanced_filters(tier: SubscriptionTier) -> Result<(), TierGateRefusal> {
    if limits_for(tier).has_advanced_filters {
        return Ok(());
    }

    let required = SubscriptionTier::iter()
        .find(|t| limits_for(*t).has_advanced_filters)
        .unwrap_or(SubscriptionTier::Star);
    Err(TierGateRefusal::AdvancedFiltersLocked { tier, required })
}

pub fn can_start_conversation(started_today: u32, tier: SubscriptionTier) -> bool {
    started_today < limits_for(tier).daily_conversations
}

pub fn check_conversation_start(
    started_today: u32,
    tier: SubscriptionTier,
) -> Result<(), TierGateRefusal> {
    if can_start_conversation(started_today, tier) {
        Ok(())
    } else {
        Err(TierGateRefusal::ConversationLimit {
            max: limits_for(tier).daily_conversations,
            tier,
        })
    }
}
