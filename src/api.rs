//! Public API surface for the event backend.
//!
//! This file consolidates the domain types shared by the repository,
//! service, and HTTP layers. All types derive Serialize/Deserialize for
//! JSON serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event identifier (database primary key).
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EventId(pub i64);

/// User identifier (database primary key).
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UserId(pub i64);

impl EventId {
    pub fn new(value: i64) -> Self {
        EventId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl UserId {
    pub fn new(value: i64) -> Self {
        UserId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EventId> for i64 {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Lifecycle status of an event.
///
/// Wire format uses the upper-case snake values (`TODO`, `IN_PROGRESS`,
/// `COMPLETED`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl EventStatus {
    /// Stable string form, matching the wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Todo => "TODO",
            EventStatus::InProgress => "IN_PROGRESS",
            EventStatus::Completed => "COMPLETED",
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TODO" => Ok(EventStatus::Todo),
            "IN_PROGRESS" => Ok(EventStatus::InProgress),
            "COMPLETED" => Ok(EventStatus::Completed),
            other => Err(format!("Unknown event status: {}", other)),
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user that can be invited to events.
///
/// The set of events a user is invited to is a read-derived view owned by
/// the repository; `Event::invitees` is the authoritative side of the
/// relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

/// A calendar event with its resolved invitee list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: EventStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Invitees with the relation fully resolved. Order carries no meaning;
    /// the repository guarantees no duplicates.
    pub invitees: Vec<User>,
}

impl Event {
    /// Ids of all invitees, in stored order.
    pub fn invitee_ids(&self) -> Vec<UserId> {
        self.invitees.iter().map(|user| user.id).collect()
    }
}

/// Payload for creating an event; the id and timestamps are assigned on
/// persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub status: EventStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Invitee user ids. Ids that do not resolve to an existing user are
    /// dropped silently on persist.
    pub invitee_ids: Vec<UserId>,
}

/// Payload for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    /// Events the new user should be invited to. Unknown ids are dropped
    /// silently on persist.
    #[serde(default)]
    pub event_ids: Vec<EventId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&EventStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(
            serde_json::from_str::<EventStatus>("\"TODO\"").unwrap(),
            EventStatus::Todo
        );
    }

    #[test]
    fn test_status_round_trip_str() {
        for status in [
            EventStatus::Todo,
            EventStatus::InProgress,
            EventStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<EventStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<EventStatus>().is_err());
    }

    #[test]
    fn test_status_default_is_todo() {
        assert_eq!(EventStatus::default(), EventStatus::Todo);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(EventId::new(42).to_string(), "42");
        assert_eq!(UserId::new(7).value(), 7);
    }
}
