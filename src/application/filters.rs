use crate::domain::{
    clamp_filters_to_tier, AdvancedFilters, AgeRange, MatchFilters, Profile, StatusBadge,
    SubscriptionTier, TierGateRefusal,
};
use crate::infrastructure::{FilterRepository, ProfileRepository, RepositoryError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum FilterServiceError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("{0}")]
    Refused(#[from] TierGateRefusal),
    #[error("Subscription changed to {current} while filters were being edited")]
    TierChanged { current: SubscriptionTier },
}

/// A profile's filters as they apply right now: the stored filters fitted to
/// the profile's tier, or the tier defaults when nothing is stored.
pub(crate) async fn load_filters<F>(
    filter_repo: &F,
    profile: &Profile,
) -> Result<MatchFilters, RepositoryError>
where
    F: FilterRepository + ?Sized,
{
    let tier = profile.subscription_tier;
    let filters = match filter_repo.get(profile.id).await? {
        Some(stored) => {
            if !stored.fits_tier(tier) {
                debug!(profile_id = %profile.id, tier = %tier, "Stored filters exceed tier, clamping");
            }
            stored.fitted_to(tier)
        }
        None => MatchFilters::defaults_for(tier),
    };
    Ok(filters)
}

/// Owns the match filters of a session and keeps them inside the tier limits.
pub struct MatchFilterService<P, F>
where
    P: ProfileRepository,
    F: FilterRepository,
{
    profile_repo: Arc<P>,
    filter_repo: Arc<F>,
}

impl<P, F> MatchFilterService<P, F>
where
    P: ProfileRepository,
    F: FilterRepository,
{
    pub fn new(profile_repo: Arc<P>, filter_repo: Arc<F>) -> Self {
        Self {
            profile_repo,
            filter_repo,
        }
    }

    /// Loads the persisted filters, or tier defaults for a first session, and
    /// stores them fitted to the profile's current tier. Starting a session
    /// also marks the profile active.
    pub async fn start_session(&self, profile_id: Uuid) -> Result<MatchFilters, FilterServiceError> {
        let profile = self.profile_repo.get_by_id(profile_id).await?;
        let filters = self.current_filters(&profile).await?;

        self.store(&profile, &filters).await?;
        self.profile_repo.touch_activity(profile_id, Utc::now()).await?;
        info!(
            profile_id = %profile_id,
            tier = %profile.subscription_tier,
            "Match filter session started"
        );

        Ok(filters)
    }

    pub async fn get_filters(&self, profile_id: Uuid) -> Result<MatchFilters, FilterServiceError> {
        let profile = self.profile_repo.get_by_id(profile_id).await?;
        self.current_filters(&profile).await
    }

    pub async fn toggle_status(
        &self,
        profile_id: Uuid,
        badge: StatusBadge,
    ) -> Result<MatchFilters, FilterServiceError> {
        self.update(profile_id, |filters, tier| filters.toggle_status(badge, tier))
            .await
    }

    pub async fn toggle_match_tier(
        &self,
        profile_id: Uuid,
        candidate: SubscriptionTier,
    ) -> Result<MatchFilters, FilterServiceError> {
        self.update(profile_id, |filters, tier| {
            filters.toggle_match_tier(candidate, tier)
        })
        .await
    }

    pub async fn set_max_distance(
        &self,
        profile_id: Uuid,
        miles: u32,
    ) -> Result<MatchFilters, FilterServiceError> {
        self.update(profile_id, |filters, tier| filters.set_max_distance(miles, tier))
            .await
    }

    pub async fn set_age_range(
        &self,
        profile_id: Uuid,
        age_range: AgeRange,
    ) -> Result<MatchFilters, FilterServiceError> {
        self.update(profile_id, |filters, _| {
            filters.age_range = age_range;
            Ok(())
        })
        .await
    }

    pub async fn set_advanced_filters(
        &self,
        profile_id: Uuid,
        advanced: AdvancedFilters,
    ) -> Result<MatchFilters, FilterServiceError> {
        self.update(profile_id, |filters, tier| filters.set_advanced(advanced, tier))
            .await
    }

    /// Handles a subscription change reported by the purchase provider.
    ///
    /// The clamped filters are computed before anything is written and are
    /// stored together with the new tier.
    pub async fn apply_tier_change(
        &self,
        profile_id: Uuid,
        new_tier: SubscriptionTier,
    ) -> Result<MatchFilters, FilterServiceError> {
        let profile = self.profile_repo.get_by_id(profile_id).await?;
        let previous = self.current_filters(&profile).await?;
        let clamped = clamp_filters_to_tier(&previous, new_tier);

        self.profile_repo
            .update_subscription_with_filters(profile_id, new_tier, &clamped)
            .await?;

        let old_tier = profile.subscription_tier;
        if new_tier < old_tier {
            info!(
                profile_id = %profile_id,
                from = %old_tier,
                to = %new_tier,
                dropped_statuses = previous.selected_statuses.len() - clamped.selected_statuses.len(),
                "Subscription downgraded, filters clamped"
            );
        } else {
            info!(
                profile_id = %profile_id,
                from = %old_tier,
                to = %new_tier,
                "Subscription changed"
            );
        }

        Ok(clamped)
    }

    /// Logout: forget the session's filters.
    pub async fn end_session(&self, profile_id: Uuid) -> Result<(), FilterServiceError> {
        self.filter_repo.delete(profile_id).await?;
        info!(profile_id = %profile_id, "Match filter session ended");
        Ok(())
    }

    async fn current_filters(&self, profile: &Profile) -> Result<MatchFilters, FilterServiceError> {
        Ok(load_filters(self.filter_repo.as_ref(), profile).await?)
    }

    /// Saves filters computed for the profile's tier. A tier change that
    /// committed in between wins and the edit is rejected.
    async fn store(&self, profile: &Profile, filters: &MatchFilters) -> Result<(), FilterServiceError> {
        let tier = profile.subscription_tier;
        if self.filter_repo.save_if_tier(profile.id, tier, filters).await? {
            return Ok(());
        }

        let current = self.profile_repo.get_by_id(profile.id).await?.subscription_tier;
        warn!(
            profile_id = %profile.id,
            expected = %tier,
            current = %current,
            "Filter write lost to a subscription change"
        );
        Err(FilterServiceError::TierChanged { current })
    }

    async fn update<M>(&self, profile_id: Uuid, mutate: M) -> Result<MatchFilters, FilterServiceError>
    where
        M: FnOnce(&mut MatchFilters, SubscriptionTier) -> Result<(), TierGateRefusal>,
    {
        let profile = self.profile_repo.get_by_id(profile_id).await?;
        let mut filters = self.current_filters(&profile).await?;

        if let Err(refusal) = mutate(&mut filters, profile.subscription_tier) {
            debug!(profile_id = %profile_id, code = refusal.code(), "Filter change refused");
            return Err(refusal.into());
        }

        self.store(&profile, &filters).await?;
        Ok(filters)
    }
}
