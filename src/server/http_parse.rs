use crate::domain::{BodyType, FilterError, ProfileAttributes, StatusBadge, SubscriptionTier};
use std::str::FromStr;

pub(super) const ALLOWED_TIERS: [&str; 3] = ["basic", "elite", "star"];

pub(super) fn parse_subscription_tier(tier: &str) -> Option<SubscriptionTier> {
    SubscriptionTier::from_str(tier.trim()).ok()
}

pub(super) fn parse_body_type(body_type: &str) -> Option<BodyType> {
    BodyType::from_str(body_type.trim()).ok()
}

pub(super) fn parse_status_badge(badge: &str) -> Option<StatusBadge> {
    StatusBadge::new(badge).ok()
}

pub(super) fn parse_profile_attributes(
    age: u8,
    statuses: &[String],
) -> Result<ProfileAttributes, FilterError> {
    let badges = statuses
        .iter()
        .map(|badge| StatusBadge::new(badge))
        .collect::<Result<Vec<_>, _>>()?;
    ProfileAttributes::new(age, badges)
}
