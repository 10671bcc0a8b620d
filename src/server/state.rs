use crate::application::{MatchFilterService, MatchService};
use crate::infrastructure::{
    AppConfig, PostgresCandidateRepository, PostgresConversationRepository,
    PostgresFilterRepository, PostgresProfileRepository,
};
use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;

pub type MatchFilterServiceType = MatchFilterService<PostgresProfileRepository, PostgresFilterRepository>;

pub type MatchServiceType = MatchService<
    PostgresProfileRepository,
    PostgresFilterRepository,
    PostgresCandidateRepository,
    PostgresConversationRepository,
>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub profile_repo: Arc<PostgresProfileRepository>,
    pub filters: Arc<MatchFilterServiceType>,
    pub matches: Arc<MatchServiceType>,
    pub webhook_token: Arc<str>,
}

/// Build full state from config + an existing pool.
///
/// Intended for embedding into a larger service that already manages a `PgPool`.
pub async fn build_state_with_pool(
    config: AppConfig,
    pool: PgPool,
    run_migrations: bool,
) -> anyhow::Result<AppState> {
    if run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;
    }

    let profile_repo = Arc::new(PostgresProfileRepository::new(pool.clone()));
    let filter_repo = Arc::new(PostgresFilterRepository::new(pool.clone()));
    let candidate_repo = Arc::new(PostgresCandidateRepository::new(pool.clone()));
    let conversation_repo = Arc::new(PostgresConversationRepository::new(pool.clone()));

    let filters = Arc::new(MatchFilterService::new(profile_repo.clone(), filter_repo.clone()));
    let matches = Arc::new(MatchService::new(
        profile_repo.clone(),
        filter_repo,
        candidate_repo,
        conversation_repo,
        config.candidate_pool_limit,
    ));

    Ok(AppState {
        pool,
        profile_repo,
        filters,
        matches,
        webhook_token: Arc::from(config.webhook_token),
    })
}

/// Build state for the standalone server.
///
/// Creates the `PgPool`, runs migrations, and wires repositories/services.
pub async fn build_state_from_env(config: AppConfig) -> anyhow::Result<AppState> {
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("connect database")?;
    build_state_with_pool(config, pool, true).await
}
