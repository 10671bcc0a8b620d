use super::filters::load_filters;
use crate::domain::{
    filter_daily_matches, Candidate, CandidateQuery, Conversation, ProfileAttributes,
    TierGateRefusal,
};
use crate::infrastructure::{
    CandidateRepository, ConversationRepository, ConversationSlot, FilterRepository,
    ProfileRepository, RepositoryError,
};
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MatchServiceError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("{0}")]
    Refused(#[from] TierGateRefusal),
    #[error("Cannot start a conversation with yourself")]
    SelfConversation,
}

pub struct MatchService<P, F, C, V>
where
    P: ProfileRepository,
    F: FilterRepository,
    C: CandidateRepository,
    V: ConversationRepository,
{
    profile_repo: Arc<P>,
    filter_repo: Arc<F>,
    candidate_repo: Arc<C>,
    conversation_repo: Arc<V>,
    pool_limit: i64,
}

impl<P, F, C, V> MatchService<P, F, C, V>
where
    P: ProfileRepository,
    F: FilterRepository,
    C: CandidateRepository,
    V: ConversationRepository,
{
    pub fn new(
        profile_repo: Arc<P>,
        filter_repo: Arc<F>,
        candidate_repo: Arc<C>,
        conversation_repo: Arc<V>,
        pool_limit: i64,
    ) -> Self {
        Self {
            profile_repo,
            filter_repo,
            candidate_repo,
            conversation_repo,
            pool_limit,
        }
    }

    /// Sets the age and badges other users' filters match against.
    pub async fn update_attributes(
        &self,
        profile_id: Uuid,
        attributes: ProfileAttributes,
    ) -> Result<ProfileAttributes, MatchServiceError> {
        self.profile_repo
            .update_attributes(profile_id, &attributes)
            .await?;
        info!(
            profile_id = %profile_id,
            age = attributes.age(),
            statuses = attributes.statuses().len(),
            "Match attributes updated"
        );
        Ok(attributes)
    }

    /// Marks the profile active at `now`, keeping it in others' daily pools.
    pub async fn record_activity(
        &self,
        profile_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), MatchServiceError> {
        self.profile_repo.touch_activity(profile_id, now).await?;
        debug!(profile_id = %profile_id, "Activity recorded");
        Ok(())
    }

    /// Candidates surfaced to `profile_id` for the day containing `now`.
    pub async fn daily_matches(
        &self,
        profile_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candidate>, MatchServiceError> {
        let profile = self.profile_repo.get_by_id(profile_id).await?;
        let tier = profile.subscription_tier;
        let filters = load_filters(self.filter_repo.as_ref(), &profile).await?;

        let query = CandidateQuery::for_filters(&filters, now, self.pool_limit);
        let pool = self.candidate_repo.list_pool(profile_id, &query).await?;
        let matches = filter_daily_matches(&pool, &filters, tier, now).to_vec();

        debug!(
            profile_id = %profile_id,
            tier = %tier,
            pool = pool.len(),
            matched = matches.len(),
            "Daily matches evaluated"
        );

        Ok(matches)
    }

    /// Opens a conversation unless the initiator has used up today's allowance.
    pub async fn start_conversation(
        &self,
        profile_id: Uuid,
        partner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Conversation, MatchServiceError> {
        if profile_id == partner_id {
            return Err(MatchServiceError::SelfConversation);
        }

        let profile = self.profile_repo.get_by_id(profile_id).await?;
        self.profile_repo.get_by_id(partner_id).await?;

        let conversation = Conversation::new(profile_id, partner_id, now);
        let slot = self
            .conversation_repo
            .create_within_allowance(&conversation, start_of_day(now), profile.subscription_tier)
            .await?;

        match slot {
            ConversationSlot::Started { started_today } => {
                info!(
                    conversation_id = %conversation.id,
                    profile_id = %profile_id,
                    partner_id = %partner_id,
                    started_today,
                    "Conversation started"
                );
                Ok(conversation)
            }
            ConversationSlot::Refused(refusal) => {
                debug!(profile_id = %profile_id, code = refusal.code(), "Conversation refused");
                Err(refusal.into())
            }
        }
    }
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}
