//! In-memory local repository implementation.
//!
//! This module provides a local implementation of all repository traits
//! suitable for unit testing and local development. All data is stored in
//! memory using HashMap structures, providing fast, deterministic, and
//! isolated execution.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::api::{Event, EventId, EventStatus, NewEvent, NewUser, User, UserId};
use crate::db::repository::{
    EventRepository, RepositoryError, RepositoryResult, RepositoryTransaction,
    TransactionalRepository, UserRepository,
};

/// In-memory local repository.
///
/// This implementation stores all data in memory using HashMaps, making it
/// ideal for unit tests and local development that need isolation and speed.
///
/// Transactions are snapshot-based: a scope clones the current state, stages
/// its mutations on the clone, and commit swaps the clone in atomically. The
/// store assumes a single logical writer per scope (see
/// [`TransactionalRepository::begin_transaction`]).
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

#[derive(Clone)]
struct StoredEvent {
    id: EventId,
    title: String,
    description: Option<String>,
    status: EventStatus,
    start_time: chrono::DateTime<Utc>,
    end_time: chrono::DateTime<Utc>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
    // Owning side of the many-to-many relation. Deduplicated, insertion order.
    invitee_ids: Vec<UserId>,
}

#[derive(Clone)]
struct StoredUser {
    id: UserId,
    name: String,
    // Read-derived reverse view; kept consistent by insert/remove below.
    event_ids: Vec<EventId>,
}

#[derive(Clone)]
struct LocalData {
    events: HashMap<EventId, StoredEvent>,
    users: HashMap<UserId, StoredUser>,

    // ID counters
    next_event_id: i64,
    next_user_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            events: HashMap::new(),
            users: HashMap::new(),
            next_event_id: 1,
            next_user_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalData {
    fn resolve_event(&self, stored: &StoredEvent) -> Event {
        let invitees = stored
            .invitee_ids
            .iter()
            .filter_map(|id| self.users.get(id))
            .map(|user| User {
                id: user.id,
                name: user.name.clone(),
            })
            .collect();

        Event {
            id: stored.id,
            title: stored.title.clone(),
            description: stored.description.clone(),
            status: stored.status,
            start_time: stored.start_time,
            end_time: stored.end_time,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            invitees,
        }
    }

    fn get_event(&self, event_id: EventId) -> RepositoryResult<Event> {
        self.events
            .get(&event_id)
            .map(|stored| self.resolve_event(stored))
            .ok_or_else(|| RepositoryError::not_found(format!("Event {} not found", event_id)))
    }

    fn all_events(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .events
            .values()
            .map(|stored| self.resolve_event(stored))
            .collect();
        events.sort_by_key(|e| e.id);
        events
    }

    fn users_by_ids(&self, user_ids: &[UserId]) -> Vec<User> {
        let mut seen = HashSet::new();
        user_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| self.users.get(id))
            .map(|user| User {
                id: user.id,
                name: user.name.clone(),
            })
            .collect()
    }

    fn insert_event(&mut self, event: &NewEvent) -> Event {
        let event_id = EventId::new(self.next_event_id);
        self.next_event_id += 1;

        // Link only invitees that actually exist; duplicates collapse.
        let mut seen = HashSet::new();
        let invitee_ids: Vec<UserId> = event
            .invitee_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .filter(|id| self.users.contains_key(id))
            .collect();

        for user_id in &invitee_ids {
            if let Some(user) = self.users.get_mut(user_id) {
                user.event_ids.push(event_id);
            }
        }

        let now = Utc::now();
        let stored = StoredEvent {
            id: event_id,
            title: event.title.clone(),
            description: event.description.clone(),
            status: event.status,
            start_time: event.start_time,
            end_time: event.end_time,
            created_at: now,
            updated_at: now,
            invitee_ids,
        };

        let resolved = self.resolve_event(&stored);
        self.events.insert(event_id, stored);
        resolved
    }

    fn remove_event(&mut self, event_id: EventId) -> RepositoryResult<()> {
        let invitee_ids = self
            .events
            .get(&event_id)
            .map(|stored| stored.invitee_ids.clone())
            .ok_or_else(|| RepositoryError::not_found(format!("Event {} not found", event_id)))?;

        // Detach from each invitee's reverse collection before removal.
        for user_id in invitee_ids {
            if let Some(user) = self.users.get_mut(&user_id) {
                user.event_ids.retain(|id| *id != event_id);
            }
        }

        self.events.remove(&event_id);
        Ok(())
    }

    fn insert_user(&mut self, user: &NewUser) -> User {
        let user_id = UserId::new(self.next_user_id);
        self.next_user_id += 1;

        let mut seen = HashSet::new();
        let event_ids: Vec<EventId> = user
            .event_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .filter(|id| self.events.contains_key(id))
            .collect();

        // The relation has one truth; keep both sides in step.
        for event_id in &event_ids {
            if let Some(event) = self.events.get_mut(event_id) {
                event.invitee_ids.push(user_id);
            }
        }

        self.users.insert(
            user_id,
            StoredUser {
                id: user_id,
                name: user.name.clone(),
                event_ids,
            },
        );

        User {
            id: user_id,
            name: user.name.clone(),
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        let mut data = self.data.write().unwrap();
        data.is_healthy = healthy;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write().unwrap();
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
    }

    /// Get the number of events stored.
    pub fn event_count(&self) -> usize {
        self.data.read().unwrap().events.len()
    }

    /// Check if an event exists.
    pub fn has_event(&self, event_id: EventId) -> bool {
        self.data.read().unwrap().events.contains_key(&event_id)
    }

    /// Events a user is currently invited to (the reverse view).
    pub fn user_event_ids(&self, user_id: UserId) -> Vec<EventId> {
        self.data
            .read()
            .unwrap()
            .users
            .get(&user_id)
            .map(|user| user.event_ids.clone())
            .unwrap_or_default()
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(&self) -> RepositoryResult<()> {
        let data = self.data.read().unwrap();
        if !data.is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        let data = self.data.read().unwrap();
        Ok(data.is_healthy)
    }

    async fn fetch_all_events(&self) -> RepositoryResult<Vec<Event>> {
        let data = self.data.read().unwrap();
        Ok(data.all_events())
    }

    async fn get_event(&self, event_id: EventId) -> RepositoryResult<Event> {
        let data = self.data.read().unwrap();
        data.get_event(event_id)
    }

    async fn store_event(&self, event: &NewEvent) -> RepositoryResult<Event> {
        self.check_health()?;
        let mut data = self.data.write().unwrap();
        Ok(data.insert_event(event))
    }
}

#[async_trait]
impl UserRepository for LocalRepository {
    async fn store_user(&self, user: &NewUser) -> RepositoryResult<User> {
        self.check_health()?;
        let mut data = self.data.write().unwrap();
        Ok(data.insert_user(user))
    }

    async fn get_user(&self, user_id: UserId) -> RepositoryResult<User> {
        let data = self.data.read().unwrap();
        data.users
            .get(&user_id)
            .map(|user| User {
                id: user.id,
                name: user.name.clone(),
            })
            .ok_or_else(|| RepositoryError::not_found(format!("User {} not found", user_id)))
    }

    async fn fetch_users_by_ids(&self, user_ids: &[UserId]) -> RepositoryResult<Vec<User>> {
        let data = self.data.read().unwrap();
        Ok(data.users_by_ids(user_ids))
    }
}

/// Snapshot-based transaction scope over the in-memory store.
///
/// Mutations apply to a private clone of the data; `commit` swaps the clone
/// into the shared store in one move. Dropping the scope without committing
/// discards the clone.
pub struct LocalTransaction {
    store: Arc<RwLock<LocalData>>,
    staged: LocalData,
}

#[async_trait]
impl RepositoryTransaction for LocalTransaction {
    async fn get_event(&mut self, event_id: EventId) -> RepositoryResult<Event> {
        self.staged.get_event(event_id)
    }

    async fn fetch_users_by_ids(&mut self, user_ids: &[UserId]) -> RepositoryResult<Vec<User>> {
        Ok(self.staged.users_by_ids(user_ids))
    }

    async fn save_event(&mut self, event: &NewEvent) -> RepositoryResult<Event> {
        Ok(self.staged.insert_event(event))
    }

    async fn delete_event(&mut self, event_id: EventId) -> RepositoryResult<()> {
        self.staged.remove_event(event_id)
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        let mut data = self.store.write().unwrap();
        *data = self.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepositoryResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TransactionalRepository for LocalRepository {
    async fn begin_transaction(&self) -> RepositoryResult<Box<dyn RepositoryTransaction>> {
        self.check_health()?;
        let staged = self.data.read().unwrap().clone();
        Ok(Box::new(LocalTransaction {
            store: Arc::clone(&self.data),
            staged,
        }))
    }
}
