use super::http_auth::is_webhook_authorized;
use super::http_errors::{
    map_filter_error, map_match_error, map_profile_read_error, map_profile_write_error,
};
use super::http_parse::{
    parse_body_type, parse_profile_attributes, parse_status_badge, parse_subscription_tier,
    ALLOWED_TIERS,
};
use super::http_types::{
    AdvancedFiltersRequest, AgeRangeRequest, AttributesRequest, AttributesResponse,
    CandidateResponse, ConversationResponse, CreateProfileRequest, FiltersResponse,
    HealthResponse, LimitsResponse, MaxDistanceRequest, ProfileResponse,
    StartConversationRequest, TierRequest, ToggleStatusRequest,
};
use super::state::AppState;
use crate::application::FilterServiceError;
use crate::domain::{
    limits_for, AdvancedFilters, AgeRange, HeightRange, MatchFilters, Profile, SubscriptionTier,
};
use crate::infrastructure::{ProfileRepository, RepositoryError};
use axum::{
    extract::{Path, State},
    http::{header::HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use strum::IntoEnumIterator;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;
use validator::Validate;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/tiers", get(list_tiers))
        .route("/tiers/:tier/limits", get(get_tier_limits))
        .route("/profiles", post(create_profile))
        .route("/profiles/:id", get(get_profile))
        .route("/profiles/by-external/:external_id", get(get_profile_by_external_id))
        .route("/profiles/:id/attributes", put(update_attributes))
        .route("/profiles/:id/activity", post(record_activity))
        .route("/profiles/:id/session", post(start_session).delete(end_session))
        .route("/profiles/:id/filters", get(get_filters))
        .route("/profiles/:id/filters/statuses", post(toggle_status))
        .route("/profiles/:id/filters/tiers", post(toggle_match_tier))
        .route("/profiles/:id/filters/distance", put(set_max_distance))
        .route("/profiles/:id/filters/age", put(set_age_range))
        .route("/profiles/:id/filters/advanced", put(set_advanced_filters))
        .route("/profiles/:id/matches", get(daily_matches))
        .route("/profiles/:id/conversations", post(start_conversation))
        .route("/profiles/:id/subscription", put(change_subscription))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        list_tiers,
        get_tier_limits,
        create_profile,
        get_profile,
        get_profile_by_external_id,
        update_attributes,
        record_activity,
        start_session,
        end_session,
        get_filters,
        toggle_status,
        toggle_match_tier,
        set_max_distance,
        set_age_range,
        set_advanced_filters,
        daily_matches,
        start_conversation,
        change_subscription,
    ),
    components(
        schemas(
            HealthResponse,
            CreateProfileRequest,
            AttributesRequest,
            ToggleStatusRequest,
            TierRequest,
            MaxDistanceRequest,
            AgeRangeRequest,
            AdvancedFiltersRequest,
            StartConversationRequest,
            ProfileResponse,
            AttributesResponse,
            FiltersResponse,
            LimitsResponse,
            CandidateResponse,
            ConversationResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Tiers", description = "Subscription tier limits"),
        (name = "Profiles", description = "Profile and session endpoints"),
        (name = "Filters", description = "Tier-gated match filter endpoints"),
        (name = "Matches", description = "Daily matches and conversations"),
    ),
    info(
        title = "Matchgate API",
        version = "0.1.0",
        description = "Subscription tier gate for match filters and daily matches",
        license(name = "MIT")
    )
)]
struct ApiDoc;

fn invalid_tier_response() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": "Invalid subscription tier",
            "allowed": ALLOWED_TIERS
        })),
    )
}

/// Health check endpoint
///
/// Verifies database connectivity and returns service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                error: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Health check failed: DB connectivity issue");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    error: Some("Database connectivity failed".to_string()),
                }),
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/tiers",
    tag = "Tiers",
    responses((status = 200, description = "Limits of every tier", body = [LimitsResponse]))
)]
async fn list_tiers() -> impl IntoResponse {
    let tiers: Vec<LimitsResponse> = SubscriptionTier::iter()
        .map(|tier| limits_for(tier).into())
        .collect();
    Json(tiers)
}

#[utoipa::path(
    get,
    path = "/tiers/{tier}/limits",
    tag = "Tiers",
    params(("tier" = String, Path, description = "basic, elite or star")),
    responses(
        (status = 200, description = "Tier limits", body = LimitsResponse),
        (status = 400, description = "Invalid subscription tier", body = Object)
    )
)]
async fn get_tier_limits(Path(tier): Path<String>) -> impl IntoResponse {
    match parse_subscription_tier(&tier) {
        Some(tier) => (
            StatusCode::OK,
            Json(serde_json::json!(LimitsResponse::from(limits_for(tier)))),
        ),
        None => invalid_tier_response(),
    }
}

#[utoipa::path(
    post,
    path = "/profiles",
    tag = "Profiles",
    request_body = CreateProfileRequest,
    responses(
        (status = 201, description = "Profile created", body = ProfileResponse),
        (status = 400, description = "Invalid request", body = Object),
        (status = 409, description = "External ID already registered", body = Object),
        (status = 500, description = "Failed to create profile", body = Object)
    )
)]
async fn create_profile(
    State(state): State<AppState>,
    Json(req): Json<CreateProfileRequest>,
) -> impl IntoResponse {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid profile", "details": errors})),
        );
    }

    let Some(tier) = parse_subscription_tier(&req.tier) else {
        return invalid_tier_response();
    };

    let attributes = match (req.age, req.statuses.is_empty()) {
        (None, true) => None,
        (None, false) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "statuses require age"})),
            );
        }
        (Some(age), _) => match parse_profile_attributes(age, &req.statuses) {
            Ok(attributes) => Some(attributes),
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": e.to_string()})),
                );
            }
        },
    };

    let profile = Profile::new(req.external_id, req.display_name, tier);
    if let Err(e) = state.profile_repo.create(&profile).await {
        if !matches!(e, RepositoryError::Conflict(_)) {
            error!(error = %e, "Failed to create profile");
        }
        let (status, body) = map_profile_write_error(&e);
        return (status, Json(body));
    }

    if let Some(attributes) = attributes {
        if let Err(e) = state.profile_repo.update_attributes(profile.id, &attributes).await {
            error!(error = %e, profile_id = %profile.id, "Failed to store match attributes");
            let (status, body) = map_profile_write_error(&e);
            return (status, Json(body));
        }
    }

    info!(profile_id = %profile.id, tier = %tier, "Profile created");
    (
        StatusCode::CREATED,
        Json(serde_json::json!(ProfileResponse::from(profile))),
    )
}

#[utoipa::path(
    get,
    path = "/profiles/{id}",
    tag = "Profiles",
    params(("id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Profile found", body = ProfileResponse),
        (status = 404, description = "Profile not found", body = Object)
    )
)]
async fn get_profile(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.profile_repo.get_by_id(id).await {
        Ok(profile) => (
            StatusCode::OK,
            Json(serde_json::json!(ProfileResponse::from(profile))),
        ),
        Err(e) => {
            if !matches!(e, RepositoryError::NotFound(_)) {
                error!(error = %e, "Failed to get profile");
            }
            let (status, body) = map_profile_read_error(&e);
            (status, Json(body))
        }
    }
}

/// Lookup by the auth provider's subject.
#[utoipa::path(
    get,
    path = "/profiles/by-external/{external_id}",
    tag = "Profiles",
    params(("external_id" = String, Path, description = "Auth provider subject")),
    responses(
        (status = 200, description = "Profile found", body = ProfileResponse),
        (status = 404, description = "Profile not found", body = Object)
    )
)]
async fn get_profile_by_external_id(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> impl IntoResponse {
    match state.profile_repo.get_by_external_id(&external_id).await {
        Ok(profile) => (
            StatusCode::OK,
            Json(serde_json::json!(ProfileResponse::from(profile))),
        ),
        Err(e) => {
            if !matches!(e, RepositoryError::NotFound(_)) {
                error!(error = %e, "Failed to get profile by external ID");
            }
            let (status, body) = map_profile_read_error(&e);
            (status, Json(body))
        }
    }
}

#[utoipa::path(
    put,
    path = "/profiles/{id}/attributes",
    tag = "Profiles",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = AttributesRequest,
    responses(
        (status = 200, description = "Match attributes stored", body = AttributesResponse),
        (status = 400, description = "Invalid age or statuses", body = Object),
        (status = 404, description = "Profile not found", body = Object)
    )
)]
async fn update_attributes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AttributesRequest>,
) -> impl IntoResponse {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid attributes", "details": errors})),
        );
    }

    let attributes = match parse_profile_attributes(req.age, &req.statuses) {
        Ok(attributes) => attributes,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": e.to_string()})),
            );
        }
    };

    match state.matches.update_attributes(id, attributes).await {
        Ok(attributes) => (
            StatusCode::OK,
            Json(serde_json::json!(AttributesResponse::from(attributes))),
        ),
        Err(e) => {
            error!(error = %e, "Failed to update match attributes");
            let (status, body) = map_match_error(&e);
            (status, Json(body))
        }
    }
}

/// Heartbeat from an active client.
#[utoipa::path(
    post,
    path = "/profiles/{id}/activity",
    tag = "Profiles",
    params(("id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Activity recorded", body = Object),
        (status = 404, description = "Profile not found", body = Object)
    )
)]
async fn record_activity(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.matches.record_activity(id, Utc::now()).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "active"}))),
        Err(e) => {
            let (status, body) = map_match_error(&e);
            (status, Json(body))
        }
    }
}

#[utoipa::path(
    post,
    path = "/profiles/{id}/session",
    tag = "Profiles",
    params(("id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Session started with tier-fitted filters", body = FiltersResponse),
        (status = 404, description = "Profile not found", body = Object)
    )
)]
async fn start_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    filters_result(state.filters.start_session(id).await)
}

#[utoipa::path(
    delete,
    path = "/profiles/{id}/session",
    tag = "Profiles",
    params(("id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Session filters removed", body = Object),
        (status = 500, description = "Failed to end session", body = Object)
    )
)]
async fn end_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.filters.end_session(id).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "ended"}))),
        Err(e) => {
            error!(error = %e, "Failed to end session");
            let (status, body) = map_filter_error(&e);
            (status, Json(body))
        }
    }
}

#[utoipa::path(
    get,
    path = "/profiles/{id}/filters",
    tag = "Filters",
    params(("id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Current filters", body = FiltersResponse),
        (status = 404, description = "Profile not found", body = Object)
    )
)]
async fn get_filters(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    filters_result(state.filters.get_filters(id).await)
}

#[utoipa::path(
    post,
    path = "/profiles/{id}/filters/statuses",
    tag = "Filters",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = ToggleStatusRequest,
    responses(
        (status = 200, description = "Status toggled", body = FiltersResponse),
        (status = 400, description = "Invalid status badge", body = Object),
        (status = 403, description = "Status limit reached for tier", body = Object),
        (status = 409, description = "Subscription changed during the edit", body = Object)
    )
)]
async fn toggle_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ToggleStatusRequest>,
) -> impl IntoResponse {
    let Some(badge) = parse_status_badge(&req.status) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid status badge"})),
        );
    };

    filters_result(state.filters.toggle_status(id, badge).await)
}

#[utoipa::path(
    post,
    path = "/profiles/{id}/filters/tiers",
    tag = "Filters",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = TierRequest,
    responses(
        (status = 200, description = "Match tier toggled", body = FiltersResponse),
        (status = 400, description = "Invalid subscription tier", body = Object),
        (status = 403, description = "Upgrade required", body = Object)
    )
)]
async fn toggle_match_tier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TierRequest>,
) -> impl IntoResponse {
    let Some(tier) = parse_subscription_tier(&req.tier) else {
        return invalid_tier_response();
    };

    filters_result(state.filters.toggle_match_tier(id, tier).await)
}

#[utoipa::path(
    put,
    path = "/profiles/{id}/filters/distance",
    tag = "Filters",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = MaxDistanceRequest,
    responses(
        (status = 200, description = "Distance updated", body = FiltersResponse),
        (status = 400, description = "Invalid distance", body = Object),
        (status = 403, description = "Distance exceeds tier limit", body = Object)
    )
)]
async fn set_max_distance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MaxDistanceRequest>,
) -> impl IntoResponse {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid distance", "details": errors})),
        );
    }

    filters_result(state.filters.set_max_distance(id, req.max_distance).await)
}

#[utoipa::path(
    put,
    path = "/profiles/{id}/filters/age",
    tag = "Filters",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = AgeRangeRequest,
    responses(
        (status = 200, description = "Age range updated", body = FiltersResponse),
        (status = 400, description = "Invalid age range", body = Object)
    )
)]
async fn set_age_range(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AgeRangeRequest>,
) -> impl IntoResponse {
    let age_range = match AgeRange::new(req.min, req.max) {
        Ok(range) => range,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": e.to_string()})),
            );
        }
    };

    filters_result(state.filters.set_age_range(id, age_range).await)
}

#[utoipa::path(
    put,
    path = "/profiles/{id}/filters/advanced",
    tag = "Filters",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = AdvancedFiltersRequest,
    responses(
        (status = 200, description = "Advanced filters updated", body = FiltersResponse),
        (status = 400, description = "Invalid advanced filters", body = Object),
        (status = 403, description = "Advanced filters locked for tier", body = Object)
    )
)]
async fn set_advanced_filters(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AdvancedFiltersRequest>,
) -> impl IntoResponse {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid advanced filters", "details": errors})),
        );
    }

    let height = match (req.height_min, req.height_max) {
        (None, None) => None,
        (Some(min), Some(max)) => match HeightRange::new(min, max) {
            Ok(range) => Some(range),
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": e.to_string()})),
                );
            }
        },
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "height_min and height_max must be set together"})),
            );
        }
    };

    let body_preference = match req.body_preference.as_deref() {
        None => None,
        Some(raw) => match parse_body_type(raw) {
            Some(body_type) => Some(body_type),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "error": "Invalid body_preference",
                        "allowed": ["slim", "athletic", "average", "curvy", "muscular", "plus"]
                    })),
                );
            }
        },
    };

    let advanced = AdvancedFilters {
        height,
        body_preference,
        ethnicity: req.ethnicity,
    };

    filters_result(state.filters.set_advanced_filters(id, advanced).await)
}

#[utoipa::path(
    get,
    path = "/profiles/{id}/matches",
    tag = "Matches",
    params(("id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Today's matches", body = [CandidateResponse]),
        (status = 404, description = "Profile not found", body = Object)
    )
)]
async fn daily_matches(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.matches.daily_matches(id, Utc::now()).await {
        Ok(candidates) => {
            let body: Vec<CandidateResponse> = candidates.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(serde_json::json!(body)))
        }
        Err(e) => {
            error!(error = %e, "Failed to load daily matches");
            let (status, body) = map_match_error(&e);
            (status, Json(body))
        }
    }
}

#[utoipa::path(
    post,
    path = "/profiles/{id}/conversations",
    tag = "Matches",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = StartConversationRequest,
    responses(
        (status = 201, description = "Conversation started", body = ConversationResponse),
        (status = 403, description = "Daily conversation limit reached", body = Object),
        (status = 404, description = "Profile not found", body = Object)
    )
)]
async fn start_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StartConversationRequest>,
) -> impl IntoResponse {
    match state
        .matches
        .start_conversation(id, req.partner_id, Utc::now())
        .await
    {
        Ok(conversation) => (
            StatusCode::CREATED,
            Json(serde_json::json!(ConversationResponse::from(conversation))),
        ),
        Err(e) => {
            warn!(error = %e, "Conversation not started");
            let (status, body) = map_match_error(&e);
            (status, Json(body))
        }
    }
}

/// Subscription-change webhook called by the purchase provider.
#[utoipa::path(
    put,
    path = "/profiles/{id}/subscription",
    tag = "Profiles",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = TierRequest,
    responses(
        (status = 200, description = "Tier changed and filters clamped", body = FiltersResponse),
        (status = 400, description = "Invalid subscription tier", body = Object),
        (status = 401, description = "Invalid or missing webhook token", body = Object),
        (status = 404, description = "Profile not found", body = Object)
    )
)]
async fn change_subscription(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<TierRequest>,
) -> impl IntoResponse {
    if !is_webhook_authorized(&headers, &state.webhook_token) {
        warn!(profile_id = %id, "Rejected unauthorized subscription webhook");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Missing or invalid authorization token"})),
        );
    }

    let Some(tier) = parse_subscription_tier(&req.tier) else {
        return invalid_tier_response();
    };

    filters_result(state.filters.apply_tier_change(id, tier).await)
}

fn filters_result(
    result: Result<MatchFilters, FilterServiceError>,
) -> (StatusCode, Json<serde_json::Value>) {
    match result {
        Ok(filters) => (
            StatusCode::OK,
            Json(serde_json::json!(FiltersResponse::from(filters))),
        ),
        Err(e) => {
            if matches!(e, FilterServiceError::Repository(_)) {
                error!(error = %e, "Filter operation failed");
            }
            let (status, body) = map_filter_error(&e);
            (status, Json(body))
        }
    }
}
