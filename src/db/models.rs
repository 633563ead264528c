//! Shared data models re-exported for database layer consumers.

pub use crate::api::{Event, EventId, EventStatus, NewEvent, NewUser, User, UserId};
