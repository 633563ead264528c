//! Transaction scope for atomic multi-step operations.
//!
//! The overlap-merge engine replaces whole groups of events atomically: the
//! merged event must be saved before any original is deleted, and a failure
//! anywhere must leave the store untouched. That requires a transaction
//! scope spanning several repository calls, modeled here as a guard object
//! with commit/rollback bound to the exit paths. Dropping an uncommitted
//! guard rolls back.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{Event, EventId, NewEvent, User, UserId};

/// Operations available inside an open transaction scope.
///
/// Reads observe writes staged earlier in the same scope. Nothing becomes
/// visible to other readers until `commit`.
#[async_trait]
pub trait RepositoryTransaction: Send {
    /// Retrieve a single event by ID, invitees resolved.
    ///
    /// # Returns
    /// * `Ok(Event)` - The event
    /// * `Err(RepositoryError::NotFound)` - If the event doesn't exist
    async fn get_event(&mut self, event_id: EventId) -> RepositoryResult<Event>;

    /// Batch-resolve users by id; missing ids are absent from the result.
    async fn fetch_users_by_ids(&mut self, user_ids: &[UserId]) -> RepositoryResult<Vec<User>>;

    /// Stage a new event; the assigned ID is returned immediately.
    async fn save_event(&mut self, event: &NewEvent) -> RepositoryResult<Event>;

    /// Stage the deletion of an event.
    ///
    /// The event is detached from each invitee's reverse collection before
    /// removal.
    ///
    /// # Returns
    /// * `Ok(())` - Deletion staged
    /// * `Err(RepositoryError::NotFound)` - If the event vanished; no
    ///   mutation is staged in that case
    async fn delete_event(&mut self, event_id: EventId) -> RepositoryResult<()>;

    /// Commit every staged operation atomically.
    async fn commit(self: Box<Self>) -> RepositoryResult<()>;

    /// Discard every staged operation.
    async fn rollback(self: Box<Self>) -> RepositoryResult<()>;
}

/// Repository capability to open transaction scopes.
#[async_trait]
pub trait TransactionalRepository: Send + Sync {
    /// Open a new transaction scope.
    ///
    /// The caller assumes exclusive logical access to the store for the
    /// lifetime of the scope; concurrent writers are not coordinated here.
    async fn begin_transaction(&self) -> RepositoryResult<Box<dyn RepositoryTransaction>>;
}
