//! Core event repository trait for CRUD operations.
//!
//! This trait defines the fundamental database operations for events and
//! their invitee relations. Deletion is deliberately absent here: removing
//! an event must detach it from every invitee's reverse collection, so it
//! is only exposed through the transaction scope
//! (`RepositoryTransaction::delete_event`).

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{Event, EventId, NewEvent};

/// Repository trait for core event database operations.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait EventRepository: Send + Sync {
    // ==================== Health & Connection ====================

    /// Check if the database connection is healthy.
    ///
    /// # Returns
    /// - `Ok(true)` if connection is healthy
    /// - `Ok(false)` if connection is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if an error occurred during the check
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Event Operations ====================

    /// Fetch every stored event with its invitee list resolved.
    ///
    /// No time filter is applied; the overlap-merge engine operates on the
    /// full set per pass.
    ///
    /// # Returns
    /// * `Ok(Vec<Event>)` - All events, invitees populated
    /// * `Err(RepositoryError)` - If the operation fails
    async fn fetch_all_events(&self) -> RepositoryResult<Vec<Event>>;

    /// Retrieve a single event by ID, invitees resolved.
    ///
    /// # Arguments
    /// * `event_id` - The ID of the event to retrieve
    ///
    /// # Returns
    /// * `Ok(Event)` - The event with its invitee list
    /// * `Err(RepositoryError::NotFound)` - If the event doesn't exist
    /// * `Err(RepositoryError)` - If the operation fails
    async fn get_event(&self, event_id: EventId) -> RepositoryResult<Event>;

    /// Store a new event and link its invitees.
    ///
    /// Invitee ids that do not resolve to an existing user are dropped
    /// silently; duplicates are collapsed.
    ///
    /// # Arguments
    /// * `event` - The event payload to store
    ///
    /// # Returns
    /// * `Ok(Event)` - The stored event including its assigned ID
    /// * `Err(RepositoryError)` - If the operation fails
    async fn store_event(&self, event: &NewEvent) -> RepositoryResult<Event>;
}
