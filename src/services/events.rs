//! Event lifecycle operations.
//!
//! Repository-agnostic business logic for creating, reading, and deleting
//! events. Input validation happens at the HTTP boundary before these
//! functions run; invitee resolution happens here.

use log::info;

use crate::api::{Event, EventId, NewEvent};
use crate::db::repository::{FullRepository, RepositoryResult};

/// Create a new event.
///
/// Invitee ids are resolved up front via a batch lookup; ids that do not
/// exist are dropped silently rather than rejected.
///
/// # Arguments
/// * `repo` - Repository implementation
/// * `new_event` - Boundary-validated event payload
///
/// # Returns
/// * `Ok(Event)` - The stored event with its resolved invitee list
/// * `Err(RepositoryError)` - If storage fails
pub async fn create_event<R>(repo: &R, new_event: NewEvent) -> RepositoryResult<Event>
where
    R: FullRepository + ?Sized,
{
    let users = repo.fetch_users_by_ids(&new_event.invitee_ids).await?;
    let resolved = NewEvent {
        invitee_ids: users.into_iter().map(|user| user.id).collect(),
        ..new_event
    };

    let event = repo.store_event(&resolved).await?;
    info!(
        "Created event {} ('{}') with {} invitees",
        event.id,
        event.title,
        event.invitees.len()
    );
    Ok(event)
}

/// Fetch a single event with its invitees.
///
/// # Returns
/// * `Ok(Event)` - The event
/// * `Err(RepositoryError::NotFound)` - If the event doesn't exist
pub async fn get_event<R>(repo: &R, event_id: EventId) -> RepositoryResult<Event>
where
    R: FullRepository + ?Sized,
{
    repo.get_event(event_id).await
}

/// Delete an event by id.
///
/// Runs inside a transaction scope: the event is detached from each
/// invitee's reverse collection, then removed. `NotFound` surfaces to the
/// caller before any mutation becomes visible.
pub async fn delete_event<R>(repo: &R, event_id: EventId) -> RepositoryResult<()>
where
    R: FullRepository + ?Sized,
{
    let mut tx = repo.begin_transaction().await?;
    match tx.delete_event(event_id).await {
        Ok(()) => {
            tx.commit().await?;
            info!("Deleted event {}", event_id);
            Ok(())
        }
        Err(err) => {
            let _ = tx.rollback().await;
            Err(err)
        }
    }
}
