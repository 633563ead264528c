//! Data Transfer Objects for the HTTP API.
//!
//! These DTOs are used for request/response serialization in the REST API.
//! Validation happens here, at the boundary, before anything reaches a
//! service or repository call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{EventId, EventStatus, NewEvent, NewUser, UserId};

// Domain types already derive Serialize and are returned as responses
// directly.
pub use crate::api::{Event, User};

/// Request body for creating a new event.
///
/// Timestamps are RFC 3339 strings and are parsed (and rejected) here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    /// Event title (required, at most 500 characters)
    pub title: String,
    /// Optional free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Lifecycle status; defaults to `TODO` when omitted
    #[serde(default)]
    pub status: EventStatus,
    /// Start of the event, RFC 3339
    pub start_time: String,
    /// End of the event, RFC 3339
    pub end_time: String,
    /// Invitee user ids; unknown ids are dropped, not rejected
    #[serde(default)]
    pub invitees: Vec<i64>,
}

impl CreateEventRequest {
    /// Validate the request and convert it into a `NewEvent`.
    ///
    /// # Errors
    /// Returns a human-readable message for an empty/oversized title or an
    /// unparsable timestamp.
    pub fn into_new_event(self) -> Result<NewEvent, String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.title.len() > 500 {
            return Err("title must be at most 500 characters".to_string());
        }

        let start_time = parse_timestamp(&self.start_time, "start_time")?;
        let end_time = parse_timestamp(&self.end_time, "end_time")?;

        Ok(NewEvent {
            title: self.title,
            description: self.description,
            status: self.status,
            start_time,
            end_time,
            invitee_ids: self.invitees.into_iter().map(UserId::new).collect(),
        })
    }
}

fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid {}: {}", field, e))
}

/// Request body for creating a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    /// Display name (required, at most 100 characters)
    pub name: String,
    /// Events the user should be invited to; unknown ids are dropped
    #[serde(default)]
    pub events: Vec<i64>,
}

impl CreateUserRequest {
    /// Validate the request and convert it into a `NewUser`.
    pub fn into_new_user(self) -> Result<NewUser, String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.name.len() > 100 {
            return Err("name must be at most 100 characters".to_string());
        }

        Ok(NewUser {
            name: self.name,
            event_ids: self.events.into_iter().map(EventId::new).collect(),
        })
    }
}

/// Response for a merge pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResponse {
    /// Number of groups that were replaced by a merged event
    pub groups_merged: usize,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Database connection status
    pub database: String,
}
