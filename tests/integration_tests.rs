//! Integration tests for matchgate
//! Drives the filter and match services end to end over an in-memory store:
//! sessions, tier changes, daily matches and conversation allowances.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use matchgate::{
    application::{FilterServiceError, MatchFilterService, MatchService, MatchServiceError},
    domain::{
        check_conversation_start, AdvancedFilters, AgeRange, BodyType, Candidate, CandidateQuery,
        Conversation, HeightRange, MatchFilters, Profile, ProfileAttributes, StatusBadge,
        SubscriptionTier, TierGateRefusal,
    },
    infrastructure::{
        CandidateRepository, ConversationRepository, ConversationSlot, FilterRepository,
        ProfileRepository, RepositoryError,
    },
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ============================================================================
// In-memory repositories
// ============================================================================

struct StoredProfile {
    profile: Profile,
    attributes: Option<ProfileAttributes>,
    last_active_at: Option<DateTime<Utc>>,
}

/// One lock over every table, so each repository call is atomic.
#[derive(Default)]
struct Store {
    profiles: Vec<StoredProfile>,
    filters: HashMap<Uuid, MatchFilters>,
    conversations: Vec<Conversation>,
}

impl Store {
    fn profile_mut(&mut self, id: Uuid) -> Result<&mut StoredProfile, RepositoryError> {
        self.profiles
            .iter_mut()
            .find(|p| p.profile.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Profile {}", id)))
    }
}

type SharedStore = Arc<Mutex<Store>>;

#[derive(Clone, Default)]
struct MockProfileRepository {
    store: SharedStore,
}

#[async_trait]
impl ProfileRepository for MockProfileRepository {
    async fn create(&self, profile: &Profile) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().unwrap();

        if store
            .profiles
            .iter()
            .any(|p| p.profile.external_id == profile.external_id)
        {
            return Err(RepositoryError::Conflict(format!(
                "Profile with external ID {} already exists",
                profile.external_id
            )));
        }

        store.profiles.push(StoredProfile {
            profile: profile.clone(),
            attributes: None,
            last_active_at: None,
        });
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Profile, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        Ok(store.profile_mut(id)?.profile.clone())
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Profile, RepositoryError> {
        let store = self.store.lock().unwrap();
        store
            .profiles
            .iter()
            .find(|p| p.profile.external_id == external_id)
            .map(|p| p.profile.clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("Profile {}", external_id)))
    }

    async fn update_attributes(
        &self,
        id: Uuid,
        attributes: &ProfileAttributes,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().unwrap();
        store.profile_mut(id)?.attributes = Some(attributes.clone());
        Ok(())
    }

    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let stored = store.profile_mut(id)?;
        stored.last_active_at = Some(stored.last_active_at.map_or(at, |prev| prev.max(at)));
        Ok(())
    }

    async fn update_subscription_with_filters(
        &self,
        id: Uuid,
        tier: SubscriptionTier,
        filters: &MatchFilters,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().unwrap();

        let stored = store.profile_mut(id)?;
        stored.profile.subscription_tier = tier;
        stored.profile.updated_at = Utc::now();
        store.filters.insert(id, filters.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MockFilterRepository {
    store: SharedStore,
}

#[async_trait]
impl FilterRepository for MockFilterRepository {
    async fn get(&self, profile_id: Uuid) -> Result<Option<MatchFilters>, RepositoryError> {
        Ok(self.store.lock().unwrap().filters.get(&profile_id).cloned())
    }

    async fn save_if_tier(
        &self,
        profile_id: Uuid,
        tier: SubscriptionTier,
        filters: &MatchFilters,
    ) -> Result<bool, RepositoryError> {
        let mut store = self.store.lock().unwrap();

        if store.profile_mut(profile_id)?.profile.subscription_tier != tier {
            return Ok(false);
        }
        store.filters.insert(profile_id, filters.clone());
        Ok(true)
    }

    async fn delete(&self, profile_id: Uuid) -> Result<(), RepositoryError> {
        self.store.lock().unwrap().filters.remove(&profile_id);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MockCandidateRepository {
    store: SharedStore,
}

#[async_trait]
impl CandidateRepository for MockCandidateRepository {
    async fn list_pool(
        &self,
        profile_id: Uuid,
        query: &CandidateQuery,
    ) -> Result<Vec<Candidate>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .profiles
            .iter()
            .filter(|p| p.profile.id != profile_id)
            .filter_map(|p| {
                let attributes = p.attributes.as_ref()?;
                Some(Candidate {
                    id: p.profile.id,
                    display_name: p.profile.display_name.clone(),
                    tier: p.profile.subscription_tier,
                    age: attributes.age(),
                    statuses: attributes.statuses().to_vec(),
                    last_active_at: p.last_active_at?,
                })
            })
            .filter(|c| query.admits(c))
            .take(query.limit.max(0) as usize)
            .collect())
    }
}

#[derive(Clone, Default)]
struct MockConversationRepository {
    store: SharedStore,
}

#[async_trait]
impl ConversationRepository for MockConversationRepository {
    async fn create_within_allowance(
        &self,
        conversation: &Conversation,
        since: DateTime<Utc>,
        tier: SubscriptionTier,
    ) -> Result<ConversationSlot, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        store.profile_mut(conversation.initiator_id)?;

        let started_today = store
            .conversations
            .iter()
            .filter(|c| c.initiator_id == conversation.initiator_id && c.started_at >= since)
            .count() as u32;

        if let Err(refusal) = check_conversation_start(started_today, tier) {
            return Ok(ConversationSlot::Refused(refusal));
        }

        store.conversations.push(conversation.clone());
        Ok(ConversationSlot::Started {
            started_today: started_today + 1,
        })
    }
}

type TestMatchService = MatchService<
    MockProfileRepository,
    MockFilterRepository,
    MockCandidateRepository,
    MockConversationRepository,
>;

struct Harness {
    store: SharedStore,
    profiles: Arc<MockProfileRepository>,
    filter_repo: Arc<MockFilterRepository>,
    filters: MatchFilterService<MockProfileRepository, MockFilterRepository>,
    matches: Arc<TestMatchService>,
}

impl Harness {
    fn new() -> Self {
        Self::with_pool_limit(500)
    }

    fn with_pool_limit(pool_limit: i64) -> Self {
        let store = SharedStore::default();
        let profiles = Arc::new(MockProfileRepository {
            store: store.clone(),
        });
        let filter_repo = Arc::new(MockFilterRepository {
            store: store.clone(),
        });
        let candidates = Arc::new(MockCandidateRepository {
            store: store.clone(),
        });
        let conversations = Arc::new(MockConversationRepository {
            store: store.clone(),
        });

        Self {
            filters: MatchFilterService::new(profiles.clone(), filter_repo.clone()),
            matches: Arc::new(MatchService::new(
                profiles.clone(),
                filter_repo.clone(),
                candidates,
                conversations,
                pool_limit,
            )),
            store,
            profiles,
            filter_repo,
        }
    }

    async fn profile(&self, tier: SubscriptionTier) -> Uuid {
        let profile = Profile::new(Uuid::new_v4().to_string(), "Tester".to_string(), tier);
        self.profiles
            .create(&profile)
            .await
            .expect("Failed to create profile");
        profile.id
    }

    /// Adds a matchable profile last seen `days_idle` days before `eval_time`.
    fn seed_candidate(&self, tier: SubscriptionTier, age: u8, days_idle: i64) -> Uuid {
        let profile = Profile::new(
            Uuid::new_v4().to_string(),
            format!("{}-{}", tier, age),
            tier,
        );
        let id = profile.id;
        self.store.lock().unwrap().profiles.push(StoredProfile {
            profile,
            attributes: Some(ProfileAttributes::new(age, vec![badge("verified")]).unwrap()),
            last_active_at: Some(eval_time() - Duration::days(days_idle)),
        });
        id
    }
}

fn badge(tag: &str) -> StatusBadge {
    StatusBadge::new(tag).expect("valid badge")
}

fn eval_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-06-10T15:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

// ============================================================================
// Test Cases
// ============================================================================

#[tokio::test]
async fn test_profile_creation() {
    let harness = Harness::new();
    let profile = Profile::new("auth|42".to_string(), "Ada".to_string(), SubscriptionTier::Elite);

    harness
        .profiles
        .create(&profile)
        .await
        .expect("Failed to create profile");

    let by_external = harness
        .profiles
        .get_by_external_id("auth|42")
        .await
        .expect("Failed to get by external ID");
    assert_eq!(by_external.id, profile.id);
    assert_eq!(by_external.subscription_tier, SubscriptionTier::Elite);

    let again = Profile::new("auth|42".to_string(), "Ada".to_string(), SubscriptionTier::Basic);
    let duplicate = harness.profiles.create(&again).await;
    assert!(matches!(duplicate, Err(RepositoryError::Conflict(_))));
}

#[tokio::test]
async fn test_session_starts_with_tier_defaults() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Basic).await;

    let filters = harness
        .filters
        .start_session(id)
        .await
        .expect("Failed to start session");

    assert_eq!(filters, MatchFilters::defaults_for(SubscriptionTier::Basic));
    assert_eq!(filters.max_distance, 50);

    let stored = harness.filter_repo.get(id).await.unwrap();
    assert_eq!(stored, Some(filters));
}

#[tokio::test]
async fn test_session_start_clamps_stale_filters() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Basic).await;

    let mut stale = MatchFilters::defaults_for(SubscriptionTier::Star);
    stale.selected_statuses = (0..7).map(|i| badge(&format!("s{}", i))).collect();
    harness.store.lock().unwrap().filters.insert(id, stale);

    let filters = harness.filters.start_session(id).await.unwrap();

    assert_eq!(filters.max_distance, 50);
    assert_eq!(filters.selected_statuses.len(), 5);
    assert_eq!(filters.selected_statuses[4], badge("s4"));
    assert_eq!(harness.filter_repo.get(id).await.unwrap(), Some(filters));
}

#[tokio::test]
async fn test_basic_status_limit() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Basic).await;

    for tag in ["a", "b", "c", "d", "e"] {
        harness
            .filters
            .toggle_status(id, badge(tag))
            .await
            .expect("Selection under the cap should succeed");
    }

    let refused = harness.filters.toggle_status(id, badge("f")).await;
    match refused {
        Err(FilterServiceError::Refused(refusal)) => assert_eq!(
            refusal.to_string(),
            "You can select up to 5 statuses with your Basic subscription"
        ),
        other => panic!("expected refusal, got {:?}", other),
    }

    // Deselecting at the cap is always allowed.
    let filters = harness.filters.toggle_status(id, badge("c")).await.unwrap();
    assert_eq!(filters.selected_statuses.len(), 4);
}

#[tokio::test]
async fn test_downgrade_clamps_filters() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Star).await;

    harness.filters.start_session(id).await.unwrap();
    harness.filters.set_max_distance(id, 200).await.unwrap();
    for i in 0..8 {
        harness
            .filters
            .toggle_status(id, badge(&format!("status-{}", i)))
            .await
            .unwrap();
    }
    harness
        .filters
        .set_advanced_filters(
            id,
            AdvancedFilters {
                height: Some(HeightRange::new(165, 185).unwrap()),
                body_preference: Some(BodyType::Athletic),
                ethnicity: None,
            },
        )
        .await
        .unwrap();

    let clamped = harness
        .filters
        .apply_tier_change(id, SubscriptionTier::Basic)
        .await
        .expect("Failed to apply tier change");

    assert_eq!(clamped.max_distance, 50);
    let expected: Vec<_> = (0..5).map(|i| badge(&format!("status-{}", i))).collect();
    assert_eq!(clamped.selected_statuses, expected);
    assert!(clamped.height.is_none());
    assert!(clamped.body_preference.is_none());

    let profile = harness.profiles.get_by_id(id).await.unwrap();
    assert_eq!(profile.subscription_tier, SubscriptionTier::Basic);
    assert_eq!(harness.filter_repo.get(id).await.unwrap(), Some(clamped));
}

#[tokio::test]
async fn test_write_for_superseded_tier_is_rejected() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Star).await;

    let mut star_filters = MatchFilters::defaults_for(SubscriptionTier::Star);
    star_filters.selected_statuses = (0..12).map(|i| badge(&format!("s{}", i))).collect();

    let clamped = harness
        .filters
        .apply_tier_change(id, SubscriptionTier::Basic)
        .await
        .unwrap();

    // A star-era edit arriving after the downgrade must not land.
    let stored = harness
        .filter_repo
        .save_if_tier(id, SubscriptionTier::Star, &star_filters)
        .await
        .unwrap();
    assert!(!stored);
    assert_eq!(harness.filter_repo.get(id).await.unwrap(), Some(clamped));
}

#[tokio::test]
async fn test_upgrade_widens_allowed_tiers() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Basic).await;
    harness.filters.toggle_status(id, badge("verified")).await.unwrap();

    let upgraded = harness
        .filters
        .apply_tier_change(id, SubscriptionTier::Star)
        .await
        .unwrap();

    assert_eq!(upgraded.selected_statuses, vec![badge("verified")]);
    assert_eq!(upgraded.allowed_tiers.len(), 3);
    assert_eq!(upgraded.max_distance, 50);
}

#[tokio::test]
async fn test_match_tier_toggle_requires_upgrade() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Elite).await;

    let refused = harness
        .filters
        .toggle_match_tier(id, SubscriptionTier::Star)
        .await;
    assert!(matches!(
        refused,
        Err(FilterServiceError::Refused(TierGateRefusal::MatchTierLocked {
            required: SubscriptionTier::Star,
            ..
        }))
    ));

    let narrowed = harness
        .filters
        .toggle_match_tier(id, SubscriptionTier::Basic)
        .await
        .unwrap();
    assert!(!narrowed.allowed_tiers.contains(&SubscriptionTier::Basic));

    // Narrowing survives a reload.
    let reloaded = harness.filters.get_filters(id).await.unwrap();
    assert_eq!(reloaded.allowed_tiers, narrowed.allowed_tiers);
}

#[tokio::test]
async fn test_advanced_filters_gated_by_tier() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Basic).await;
    let advanced = AdvancedFilters {
        ethnicity: Some("any".to_string()),
        ..Default::default()
    };

    let refused = harness.filters.set_advanced_filters(id, advanced.clone()).await;
    assert!(matches!(
        refused,
        Err(FilterServiceError::Refused(TierGateRefusal::AdvancedFiltersLocked { .. }))
    ));

    harness
        .filters
        .apply_tier_change(id, SubscriptionTier::Elite)
        .await
        .unwrap();
    let filters = harness
        .filters
        .set_advanced_filters(id, advanced)
        .await
        .unwrap();
    assert_eq!(filters.ethnicity.as_deref(), Some("any"));
}

#[tokio::test]
async fn test_end_session_resets_filters() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Elite).await;

    harness
        .filters
        .set_age_range(id, AgeRange::new(30, 40).unwrap())
        .await
        .unwrap();
    harness.filters.end_session(id).await.unwrap();

    assert!(harness.filter_repo.get(id).await.unwrap().is_none());
    let fresh = harness.filters.start_session(id).await.unwrap();
    assert_eq!(fresh.age_range, AgeRange::default());
}

#[tokio::test]
async fn test_new_profile_becomes_matchable() {
    let harness = Harness::new();
    let viewer = harness.profile(SubscriptionTier::Basic).await;
    let newcomer = harness.profile(SubscriptionTier::Basic).await;

    // No attributes or activity yet: not in anyone's pool.
    let before = harness.matches.daily_matches(viewer, Utc::now()).await.unwrap();
    assert!(before.is_empty());

    harness
        .matches
        .update_attributes(
            newcomer,
            ProfileAttributes::new(29, vec![badge("verified")]).unwrap(),
        )
        .await
        .expect("Failed to store attributes");
    harness.filters.start_session(newcomer).await.unwrap();

    let after = harness.matches.daily_matches(viewer, Utc::now()).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, newcomer);
    assert_eq!(after[0].age, 29);
}

#[tokio::test]
async fn test_elite_daily_matches() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Elite).await;

    let tiers = [SubscriptionTier::Basic, SubscriptionTier::Elite, SubscriptionTier::Star];
    for i in 0..20 {
        harness.seed_candidate(tiers[i % 3], 22 + i as u8, 1);
    }

    let first = harness
        .matches
        .daily_matches(id, eval_time())
        .await
        .expect("Failed to load matches");
    let second = harness.matches.daily_matches(id, eval_time()).await.unwrap();

    assert!(first.len() <= 15);
    assert!(first.iter().all(|c| c.tier != SubscriptionTier::Star));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_daily_matches_apply_filters() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Basic).await;
    harness
        .filters
        .set_age_range(id, AgeRange::new(25, 30).unwrap())
        .await
        .unwrap();

    harness.seed_candidate(SubscriptionTier::Basic, 40, 0);
    harness.seed_candidate(SubscriptionTier::Basic, 26, 10);
    let active_in_range = harness.seed_candidate(SubscriptionTier::Basic, 27, 2);
    harness.seed_candidate(SubscriptionTier::Elite, 27, 0);

    let matches = harness.matches.daily_matches(id, eval_time()).await.unwrap();
    let ids: Vec<_> = matches.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![active_in_range]);
}

#[tokio::test]
async fn test_pool_limit_counts_only_eligible_candidates() {
    let harness = Harness::with_pool_limit(2);
    let id = harness.profile(SubscriptionTier::Basic).await;

    harness.seed_candidate(SubscriptionTier::Basic, 30, 20);
    harness.seed_candidate(SubscriptionTier::Basic, 30, 30);
    let active = harness.seed_candidate(SubscriptionTier::Basic, 30, 1);

    let matches = harness.matches.daily_matches(id, eval_time()).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, active);
}

#[tokio::test]
async fn test_conversation_daily_limit() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Basic).await;
    let partner = harness.profile(SubscriptionTier::Basic).await;
    let morning = eval_time() - Duration::hours(6);

    for _ in 0..3 {
        harness
            .matches
            .start_conversation(id, partner, morning)
            .await
            .expect("Conversation under the cap should start");
    }

    let refused = harness.matches.start_conversation(id, partner, eval_time()).await;
    assert!(matches!(
        refused,
        Err(MatchServiceError::Refused(TierGateRefusal::ConversationLimit { max: 3, .. }))
    ));

    let tomorrow = eval_time() + Duration::days(1);
    assert!(harness
        .matches
        .start_conversation(id, partner, tomorrow)
        .await
        .is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_conversations_respect_allowance() {
    let harness = Harness::new();
    let id = harness.profile(SubscriptionTier::Basic).await;
    let partner = harness.profile(SubscriptionTier::Basic).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let matches = harness.matches.clone();
            tokio::spawn(async move { matches.start_conversation(id, partner, eval_time()).await })
        })
        .collect();

    let mut started = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => started += 1,
            Err(MatchServiceError::Refused(TierGateRefusal::ConversationLimit { .. })) => {
                refused += 1
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(started, 3);
    assert_eq!(refused, 7);
    assert_eq!(harness.store.lock().unwrap().conversations.len(), 3);
}

#[tokio::test]
async fn test_unknown_profile_is_not_found() {
    let harness = Harness::new();

    let result = harness.filters.start_session(Uuid::new_v4()).await;
    assert!(matches!(
        result,
        Err(FilterServiceError::Repository(RepositoryError::NotFound(_)))
    ));

    let result = harness.matches.daily_matches(Uuid::new_v4(), eval_time()).await;
    assert!(matches!(
        result,
        Err(MatchServiceError::Repository(RepositoryError::NotFound(_)))
    ));
}
