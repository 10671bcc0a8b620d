use crate::application::{FilterServiceError, MatchServiceError};
use crate::domain::TierGateRefusal;
use crate::infrastructure::RepositoryError;
use axum::http::StatusCode;

pub(super) fn refusal_response(refusal: &TierGateRefusal) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::FORBIDDEN,
        serde_json::json!({ "error": refusal.to_string(), "code": refusal.code() }),
    )
}

pub(super) fn map_filter_error(err: &FilterServiceError) -> (StatusCode, serde_json::Value) {
    match err {
        FilterServiceError::Refused(refusal) => refusal_response(refusal),
        FilterServiceError::Repository(RepositoryError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "Profile not found" }),
        ),
        FilterServiceError::TierChanged { current } => (
            StatusCode::CONFLICT,
            serde_json::json!({ "error": err.to_string(), "tier": current.to_string() }),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "Failed to update filters" }),
        ),
    }
}

pub(super) fn map_match_error(err: &MatchServiceError) -> (StatusCode, serde_json::Value) {
    match err {
        MatchServiceError::Refused(refusal) => refusal_response(refusal),
        MatchServiceError::SelfConversation => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": err.to_string() }),
        ),
        MatchServiceError::Repository(RepositoryError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "Profile not found" }),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "Failed to load matches" }),
        ),
    }
}

pub(super) fn map_profile_read_error(err: &RepositoryError) -> (StatusCode, serde_json::Value) {
    match err {
        RepositoryError::NotFound(_) => {
            (StatusCode::NOT_FOUND, serde_json::json!({ "error": "Profile not found" }))
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "Failed to get profile" }),
        ),
    }
}

pub(super) fn map_profile_write_error(err: &RepositoryError) -> (StatusCode, serde_json::Value) {
    match err {
        RepositoryError::Conflict(_) => (
            StatusCode::CONFLICT,
            serde_json::json!({ "error": "Profile already exists" }),
        ),
        RepositoryError::NotFound(_) => {
            (StatusCode::NOT_FOUND, serde_json::json!({ "error": "Profile not found" }))
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "Failed to save profile" }),
        ),
    }
}
