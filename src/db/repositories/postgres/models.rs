use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::{event_invitees, events, users};
use crate::api::{User, UserId};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// created_at/updated_at come from the column defaults.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = events)]
pub struct NewEventRow {
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: i64,
    pub name: String,
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            id: UserId::new(self.id),
            name: self.name,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow {
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = event_invitees)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventInviteeRow {
    pub event_id: i64,
    pub user_id: i64,
}
