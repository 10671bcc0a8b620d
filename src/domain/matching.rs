use super::filters::{AgeRange, MatchFilters, StatusBadge};
use super::tier::{limits_for, SubscriptionTier};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A candidate counts as active when seen within this many days.
pub const ACTIVE_WINDOW_DAYS: i64 = 7;

/// A profile that may be surfaced as a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub display_name: String,
    pub tier: SubscriptionTier,
    pub age: u8,
    pub statuses: Vec<StatusBadge>,
    pub last_active_at: DateTime<Utc>,
}

impl Candidate {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now - self.last_active_at <= Duration::days(ACTIVE_WINDOW_DAYS)
    }

    fn passes(&self, filters: &MatchFilters, now: DateTime<Utc>) -> bool {
        self.is_active_at(now)
            && filters.allowed_tiers.contains(&self.tier)
            && (filters.selected_statuses.is_empty()
                || self
                    .statuses
                    .iter()
                    .any(|s| filters.selected_statuses.contains(s)))
            && filters.age_range.contains(self.age)
    }
}

/// The cheap part of the match filters, evaluated by storage before any row
/// limit applies so that the limit only counts eligible candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    pub active_since: DateTime<Utc>,
    pub allowed_tiers: Vec<SubscriptionTier>,
    pub age_range: AgeRange,
    /// Empty means any statuses.
    pub statuses: Vec<StatusBadge>,
    pub limit: i64,
}

impl CandidateQuery {
    pub fn for_filters(filters: &MatchFilters, now: DateTime<Utc>, limit: i64) -> Self {
        Self {
            active_since: now - Duration::days(ACTIVE_WINDOW_DAYS),
            allowed_tiers: filters.allowed_tiers.iter().copied().collect(),
            age_range: filters.age_range,
            statuses: filters.selected_statuses.clone(),
            limit,
        }
    }

    pub fn admits(&self, candidate: &Candidate) -> bool {
        candidate.last_active_at >= self.active_since
            && self.allowed_tiers.contains(&candidate.tier)
            && self.age_range.contains(candidate.age)
            && (self.statuses.is_empty()
                || candidate.statuses.iter().any(|s| self.statuses.contains(s)))
    }
}

/// Today's matches for one user, evaluated lazily.
///
/// Borrowing the pool keeps the view restartable: every call to `iter` walks
/// the pool from the start and yields the same candidates in pool order.
#[derive(Debug, Clone, Copy)]
pub struct DailyMatches<'a> {
    candidates: &'a [Candidate],
    filters: &'a MatchFilters,
    limit: usize,
    now: DateTime<Utc>,
}

impl<'a> DailyMatches<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a Candidate> + 'a {
        let DailyMatches {
            candidates,
            filters,
            limit,
            now,
        } = *self;
        candidates
            .iter()
            .filter(move |c| c.passes(filters, now))
            .take(limit)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn to_vec(&self) -> Vec<Candidate> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for DailyMatches<'a> {
    type Item = &'a Candidate;
    type IntoIter = Box<dyn Iterator<Item = &'a Candidate> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Applies recency, tier, status and age filters to `candidates`, capped at
/// the tier's daily match count. Pool order is preserved; nothing is ranked.
pub fn filter_daily_matches<'a>(
    candidates: &'a [Candidate],
    filters: &'a MatchFilters,
    tier: SubscriptionTier,
    now: DateTime<Utc>,
) -> DailyMatches<'a> {
    DailyMatches {
        candidates,
        filters,
        limit: limits_for(tier).daily_matches,
        now,
    }
}
