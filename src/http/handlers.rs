//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the service
//! layer for business logic.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::dto::{CreateEventRequest, CreateUserRequest, HealthResponse, MergeResponse};
use super::error::AppError;
use super::state::AppState;
use crate::api::{Event, EventId, User};
use crate::services;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and the
/// repository is accessible.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository.health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Event CRUD
// =============================================================================

/// POST /v1/events
///
/// Create a new event. Validation failures are rejected here, before any
/// persistence call; unknown invitee ids are dropped silently.
pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let new_event = request.into_new_event().map_err(AppError::BadRequest)?;

    let event = services::create_event(state.repository.as_ref(), new_event).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /v1/events/{event_id}
///
/// Fetch a single event with its invitees.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> HandlerResult<Event> {
    let event = services::get_event(state.repository.as_ref(), EventId::new(event_id)).await?;
    Ok(Json(event))
}

/// DELETE /v1/events/{event_id}
///
/// Delete an event; 404 if it does not exist.
pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    services::delete_event(state.repository.as_ref(), EventId::new(event_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/events/merge
///
/// Run one overlap-merge pass over all stored events.
pub async fn merge_events(State(state): State<AppState>) -> HandlerResult<MergeResponse> {
    let groups_merged = services::merge_all(state.repository.as_ref()).await?;
    Ok(Json(MergeResponse { groups_merged }))
}

// =============================================================================
// Users
// =============================================================================

/// POST /v1/users
///
/// Create a new user, optionally invited to existing events.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let new_user = request.into_new_user().map_err(AppError::BadRequest)?;

    let user = services::create_user(state.repository.as_ref(), new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}
