//! Integration tests for the event/user lifecycle services.

use chrono::{TimeZone, Utc};
use evently::api::{EventId, EventStatus, NewEvent, NewUser, UserId};
use evently::db::repositories::LocalRepository;
use evently::db::repository::{EventRepository, RepositoryError};
use evently::services;

fn new_event(title: &str, invitee_ids: Vec<UserId>) -> NewEvent {
    NewEvent {
        title: title.to_string(),
        description: Some("weekly".to_string()),
        status: EventStatus::Todo,
        start_time: Utc.with_ymd_and_hms(2024, 5, 14, 13, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2024, 5, 14, 15, 0, 0).unwrap(),
        invitee_ids,
    }
}

#[tokio::test]
async fn test_create_event_resolves_invitees() {
    let repo = LocalRepository::new();
    let alice = services::create_user(
        &repo,
        NewUser {
            name: "Alice".to_string(),
            event_ids: vec![],
        },
    )
    .await
    .unwrap();

    let event = services::create_event(&repo, new_event("Standup", vec![alice.id]))
        .await
        .unwrap();

    assert_eq!(event.invitees, vec![alice]);
    assert_eq!(event.status, EventStatus::Todo);
}

#[tokio::test]
async fn test_create_event_drops_unknown_invitees() {
    let repo = LocalRepository::new();
    let alice = services::create_user(
        &repo,
        NewUser {
            name: "Alice".to_string(),
            event_ids: vec![],
        },
    )
    .await
    .unwrap();

    let event = services::create_event(
        &repo,
        new_event("Standup", vec![alice.id, UserId::new(404)]),
    )
    .await
    .unwrap();

    assert_eq!(event.invitee_ids(), vec![alice.id]);
}

#[tokio::test]
async fn test_get_event_not_found() {
    let repo = LocalRepository::new();

    let result = services::get_event(&repo, EventId::new(1)).await;
    assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
}

#[tokio::test]
async fn test_delete_event_detaches_invitees() {
    let repo = LocalRepository::new();
    let alice = services::create_user(
        &repo,
        NewUser {
            name: "Alice".to_string(),
            event_ids: vec![],
        },
    )
    .await
    .unwrap();
    let event = services::create_event(&repo, new_event("Standup", vec![alice.id]))
        .await
        .unwrap();

    services::delete_event(&repo, event.id).await.unwrap();

    assert!(matches!(
        repo.get_event(event.id).await,
        Err(RepositoryError::NotFound { .. })
    ));
    assert!(repo.user_event_ids(alice.id).is_empty());
}

#[tokio::test]
async fn test_delete_missing_event_surfaces_not_found() {
    let repo = LocalRepository::new();

    let result = services::delete_event(&repo, EventId::new(9)).await;
    assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    // Nothing was mutated.
    assert_eq!(repo.event_count(), 0);
}

#[tokio::test]
async fn test_delete_is_not_idempotent() {
    let repo = LocalRepository::new();
    let event = services::create_event(&repo, new_event("Standup", vec![]))
        .await
        .unwrap();

    services::delete_event(&repo, event.id).await.unwrap();
    let second = services::delete_event(&repo, event.id).await;
    assert!(matches!(second, Err(RepositoryError::NotFound { .. })));
}

#[tokio::test]
async fn test_create_user_with_initial_events() {
    let repo = LocalRepository::new();
    let event = services::create_event(&repo, new_event("Kickoff", vec![]))
        .await
        .unwrap();

    let bob = services::create_user(
        &repo,
        NewUser {
            name: "Bob".to_string(),
            event_ids: vec![event.id, EventId::new(55)],
        },
    )
    .await
    .unwrap();

    let refreshed = repo.get_event(event.id).await.unwrap();
    assert_eq!(refreshed.invitee_ids(), vec![bob.id]);
}
