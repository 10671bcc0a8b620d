use super::tier::{
    check_advanced_filters, check_match_tier_selection, check_max_distance,
    check_status_selection, limits_for, SubscriptionTier, TierGateRefusal,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use strum::{Display, EnumString};
use thiserror::Error;

pub const MIN_AGE: u8 = 18;
pub const MAX_AGE: u8 = 99;
pub const MAX_STATUS_BADGE_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Age range must satisfy 18 <= min <= max <= 99, got {min}-{max}")]
    InvalidAgeRange { min: u8, max: u8 },
    #[error("Height range must satisfy 0 < min <= max, got {min}-{max}")]
    InvalidHeightRange { min: u16, max: u16 },
    #[error("Status badge must be 1-64 characters")]
    InvalidStatusBadge,
    #[error("Status badge {0} is listed more than once")]
    DuplicateStatus(String),
    #[error("Age must be between 18 and 99, got {0}")]
    InvalidAge(u8),
}

/// Tag attached to a profile (e.g. "verified", "homeowner").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StatusBadge(String);

impl StatusBadge {
    pub fn new(tag: impl AsRef<str>) -> Result<Self, FilterError> {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || tag.chars().count() > MAX_STATUS_BADGE_LEN {
            return Err(FilterError::InvalidStatusBadge);
        }
        Ok(Self(tag.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StatusBadge {
    type Error = FilterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        StatusBadge::new(value)
    }
}

impl From<StatusBadge> for String {
    fn from(badge: StatusBadge) -> Self {
        badge.0
    }
}

impl fmt::Display for StatusBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fails on the first badge that appears twice.
pub fn ensure_distinct_statuses(statuses: &[StatusBadge]) -> Result<(), FilterError> {
    let mut seen = HashSet::with_capacity(statuses.len());
    match statuses.iter().find(|badge| !seen.insert(*badge)) {
        Some(duplicate) => Err(FilterError::DuplicateStatus(duplicate.to_string())),
        None => Ok(()),
    }
}

fn distinct_statuses<'de, D>(deserializer: D) -> Result<Vec<StatusBadge>, D::Error>
where
    D: Deserializer<'de>,
{
    let statuses = Vec::<StatusBadge>::deserialize(deserializer)?;
    ensure_distinct_statuses(&statuses).map_err(serde::de::Error::custom)?;
    Ok(statuses)
}

/// Inclusive age bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RangeBounds<u8>", into = "RangeBounds<u8>")]
pub struct AgeRange {
    min: u8,
    max: u8,
}

impl AgeRange {
    pub fn new(min: u8, max: u8) -> Result<Self, FilterError> {
        if min < MIN_AGE || max > MAX_AGE || min > max {
            return Err(FilterError::InvalidAgeRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    pub fn contains(&self, age: u8) -> bool {
        (self.min..=self.max).contains(&age)
    }
}

impl Default for AgeRange {
    fn default() -> Self {
        Self {
            min: MIN_AGE,
            max: MAX_AGE,
        }
    }
}

/// Inclusive height bounds in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RangeBounds<u16>", into = "RangeBounds<u16>")]
pub struct HeightRange {
    min: u16,
    max: u16,
}

impl HeightRange {
    pub fn new(min: u16, max: u16) -> Result<Self, FilterError> {
        if min == 0 || min > max {
            return Err(FilterError::InvalidHeightRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u16 {
        self.min
    }

    pub fn max(&self) -> u16 {
        self.max
    }
}

/// Unvalidated wire form of an inclusive range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RangeBounds<T> {
    pub min: T,
    pub max: T,
}

impl TryFrom<RangeBounds<u8>> for AgeRange {
    type Error = FilterError;

    fn try_from(raw: RangeBounds<u8>) -> Result<Self, Self::Error> {
        AgeRange::new(raw.min, raw.max)
    }
}

impl From<AgeRange> for RangeBounds<u8> {
    fn from(range: AgeRange) -> Self {
        RangeBounds {
            min: range.min,
            max: range.max,
        }
    }
}

impl TryFrom<RangeBounds<u16>> for HeightRange {
    type Error = FilterError;

    fn try_from(raw: RangeBounds<u16>) -> Result<Self, Self::Error> {
        HeightRange::new(raw.min, raw.max)
    }
}

impl From<HeightRange> for RangeBounds<u16> {
    fn from(range: HeightRange) -> Self {
        RangeBounds {
            min: range.min,
            max: range.max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BodyType {
    Slim,
    Athletic,
    Average,
    Curvy,
    Muscular,
    Plus,
}

/// The filter fields gated behind `has_advanced_filters`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedFilters {
    pub height: Option<HeightRange>,
    pub body_preference: Option<BodyType>,
    pub ethnicity: Option<String>,
}

/// Per-user match filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFilters {
    pub max_distance: u32,
    #[serde(deserialize_with = "distinct_statuses")]
    pub selected_statuses: Vec<StatusBadge>,
    pub age_range: AgeRange,
    pub height: Option<HeightRange>,
    pub body_preference: Option<BodyType>,
    pub ethnicity: Option<String>,
    pub allowed_tiers: BTreeSet<SubscriptionTier>,
}

impl MatchFilters {
    /// Filters a fresh session starts with.
    pub fn defaults_for(tier: SubscriptionTier) -> Self {
        let limits = limits_for(tier);
        Self {
            max_distance: limits.max_distance,
            selected_statuses: Vec::new(),
            age_range: AgeRange::default(),
            height: None,
            body_preference: None,
            ethnicity: None,
            allowed_tiers: limits.allowed_match_tiers,
        }
    }

    pub fn advanced(&self) -> AdvancedFilters {
        AdvancedFilters {
            height: self.height,
            body_preference: self.body_preference,
            ethnicity: self.ethnicity.clone(),
        }
    }

    pub fn has_advanced(&self) -> bool {
        self.height.is_some() || self.body_preference.is_some() || self.ethnicity.is_some()
    }

    /// Selects `badge` or deselects it when already present.
    pub fn toggle_status(
        &mut self,
        badge: StatusBadge,
        tier: SubscriptionTier,
    ) -> Result<(), TierGateRefusal> {
        if let Some(pos) = self.selected_statuses.iter().position(|s| *s == badge) {
            self.selected_statuses.remove(pos);
            return Ok(());
        }

        check_status_selection(&self.selected_statuses, &badge, tier)?;
        self.selected_statuses.push(badge);
        Ok(())
    }

    /// Narrows by removing a present tier; adding one requires it to be unlocked.
    pub fn toggle_match_tier(
        &mut self,
        candidate: SubscriptionTier,
        tier: SubscriptionTier,
    ) -> Result<(), TierGateRefusal> {
        if self.allowed_tiers.remove(&candidate) {
            return Ok(());
        }

        check_match_tier_selection(candidate, tier)?;
        self.allowed_tiers.insert(candidate);
        Ok(())
    }

    pub fn set_max_distance(&mut self, miles: u32, tier: SubscriptionTier) -> Result<(), TierGateRefusal> {
        check_max_distance(miles, tier)?;
        self.max_distance = miles;
        Ok(())
    }

    pub fn set_advanced(
        &mut self,
        advanced: AdvancedFilters,
        tier: SubscriptionTier,
    ) -> Result<(), TierGateRefusal> {
        check_advanced_filters(tier)?;
        self.height = advanced.height;
        self.body_preference = advanced.body_preference;
        self.ethnicity = advanced.ethnicity;
        Ok(())
    }

    /// Returns the filters unchanged when they fit `tier`, clamped otherwise.
    ///
    /// Unlike an unconditional clamp this keeps a user's narrowed
    /// `allowed_tiers`.
    pub fn fitted_to(self, tier: SubscriptionTier) -> MatchFilters {
        if self.fits_tier(tier) {
            self
        } else {
            clamp_filters_to_tier(&self, tier)
        }
    }

    /// Whether every field already sits inside the limits of `tier`.
    pub fn fits_tier(&self, tier: SubscriptionTier) -> bool {
        let limits = limits_for(tier);
        self.max_distance <= limits.max_distance
            && self.selected_statuses.len() <= limits.max_statuses
            && self.allowed_tiers.is_subset(&limits.allowed_match_tiers)
            && (limits.has_advanced_filters || !self.has_advanced())
    }
}

/// Fits `filters` inside the limits of `tier`.
///
/// Distance is capped, statuses keep their first `max_statuses` entries in
/// selection order, allowed tiers are reset to the tier's allowed set, and the
/// advanced fields are dropped when the tier has no advanced filters.
pub fn clamp_filters_to_tier(filters: &MatchFilters, tier: SubscriptionTier) -> MatchFilters {
    let limits = limits_for(tier);
    let mut clamped = filters.clone();

    clamped.max_distance = filters.max_distance.min(limits.max_distance);
    clamped.selected_statuses.truncate(limits.max_statuses);
    clamped.allowed_tiers = limits.allowed_match_tiers;

    if !limits.has_advanced_filters {
        clamped.height = None;
        clamped.body_preference = None;
        clamped.ethnicity = None;
    }

    debug_assert!(clamped.fits_tier(tier));
    clamped
}
