//! End-to-end tests for the overlap-merge engine against the in-memory
//! repository.

use chrono::{DateTime, TimeZone, Utc};
use evently::api::{Event, EventId, EventStatus, NewEvent, NewUser, UserId};
use evently::db::repositories::LocalRepository;
use evently::db::repository::{EventRepository, RepositoryError, UserRepository};
use evently::services;

fn hour(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 14, h, 0, 0).unwrap()
}

async fn seed_user(repo: &LocalRepository, name: &str) -> UserId {
    repo.store_user(&NewUser {
        name: name.to_string(),
        event_ids: vec![],
    })
    .await
    .unwrap()
    .id
}

async fn seed_event(
    repo: &LocalRepository,
    title: &str,
    status: EventStatus,
    start_hour: u32,
    end_hour: u32,
    invitees: &[UserId],
) -> EventId {
    repo.store_event(&NewEvent {
        title: title.to_string(),
        description: None,
        status,
        start_time: hour(start_hour),
        end_time: hour(end_hour),
        invitee_ids: invitees.to_vec(),
    })
    .await
    .unwrap()
    .id
}

async fn all_events(repo: &LocalRepository) -> Vec<Event> {
    repo.fetch_all_events().await.unwrap()
}

#[tokio::test]
async fn test_clean_pass_is_a_no_op() {
    let repo = LocalRepository::new();
    let alice = seed_user(&repo, "Alice").await;

    // C ends before D starts: no overlap.
    seed_event(&repo, "C", EventStatus::Todo, 9, 10, &[alice]).await;
    seed_event(&repo, "D", EventStatus::Todo, 11, 12, &[alice]).await;

    let before = all_events(&repo).await;
    let merged = services::merge_all(&repo).await.unwrap();

    assert_eq!(merged, 0);
    assert_eq!(all_events(&repo).await, before);
}

#[tokio::test]
async fn test_merges_overlapping_events_with_shared_invitee() {
    let repo = LocalRepository::new();
    let alice = seed_user(&repo, "Alice").await;
    let bob = seed_user(&repo, "Bob").await;

    let a = seed_event(&repo, "A", EventStatus::Todo, 13, 15, &[alice, bob]).await;
    let b = seed_event(&repo, "B", EventStatus::Todo, 14, 16, &[alice]).await;

    let merged = services::merge_all(&repo).await.unwrap();
    assert_eq!(merged, 1);

    let events = all_events(&repo).await;
    assert_eq!(events.len(), 1);

    let event = &events[0];
    assert_eq!(event.title, "A / B");
    assert_eq!(event.start_time, hour(13));
    assert_eq!(event.end_time, hour(16));
    let mut invitee_ids = event.invitee_ids();
    invitee_ids.sort();
    assert_eq!(invitee_ids, vec![alice, bob]);

    // Originals are gone.
    for id in [a, b] {
        assert!(matches!(
            repo.get_event(id).await,
            Err(RepositoryError::NotFound { .. })
        ));
    }
}

#[tokio::test]
async fn test_touching_events_are_not_merged() {
    let repo = LocalRepository::new();
    let alice = seed_user(&repo, "Alice").await;

    // D starts exactly when C ends; `start < end` is strict.
    seed_event(&repo, "C", EventStatus::Todo, 9, 10, &[alice]).await;
    seed_event(&repo, "D", EventStatus::Todo, 10, 12, &[alice]).await;

    assert_eq!(services::merge_all(&repo).await.unwrap(), 0);
    assert_eq!(all_events(&repo).await.len(), 2);
}

#[tokio::test]
async fn test_event_without_invitees_is_never_merged() {
    let repo = LocalRepository::new();
    let carol = seed_user(&repo, "Carol").await;

    seed_event(&repo, "E", EventStatus::Todo, 13, 15, &[]).await;
    seed_event(&repo, "F", EventStatus::Todo, 14, 16, &[carol]).await;

    assert_eq!(services::merge_all(&repo).await.unwrap(), 0);
    assert_eq!(all_events(&repo).await.len(), 2);
}

#[tokio::test]
async fn test_transitive_overlap_merges_into_one_event() {
    let repo = LocalRepository::new();
    let alice = seed_user(&repo, "Alice").await;
    let bob = seed_user(&repo, "Bob").await;

    // A overlaps B, B overlaps C; A and C never overlap directly.
    seed_event(&repo, "A", EventStatus::Todo, 9, 11, &[alice]).await;
    seed_event(&repo, "B", EventStatus::Todo, 10, 13, &[alice, bob]).await;
    seed_event(&repo, "C", EventStatus::Todo, 12, 14, &[bob]).await;

    assert_eq!(services::merge_all(&repo).await.unwrap(), 1);

    let events = all_events(&repo).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "A / B / C");
    assert_eq!(events[0].start_time, hour(9));
    assert_eq!(events[0].end_time, hour(14));
}

#[tokio::test]
async fn test_status_reduction_priority() {
    let cases = [
        (EventStatus::InProgress, EventStatus::Todo, EventStatus::InProgress),
        (EventStatus::Todo, EventStatus::Completed, EventStatus::Todo),
        (EventStatus::Completed, EventStatus::Completed, EventStatus::Completed),
    ];

    for (first, second, expected) in cases {
        let repo = LocalRepository::new();
        let alice = seed_user(&repo, "Alice").await;

        seed_event(&repo, "A", first, 13, 15, &[alice]).await;
        seed_event(&repo, "B", second, 14, 16, &[alice]).await;

        assert_eq!(services::merge_all(&repo).await.unwrap(), 1);
        let events = all_events(&repo).await;
        assert_eq!(events[0].status, expected, "{:?} + {:?}", first, second);
    }
}

#[tokio::test]
async fn test_invitee_union_has_no_duplicates() {
    let repo = LocalRepository::new();
    let alice = seed_user(&repo, "Alice").await;
    let bob = seed_user(&repo, "Bob").await;
    let carol = seed_user(&repo, "Carol").await;

    seed_event(&repo, "A", EventStatus::Todo, 13, 15, &[alice, bob]).await;
    seed_event(&repo, "B", EventStatus::Todo, 14, 16, &[bob, carol]).await;

    assert_eq!(services::merge_all(&repo).await.unwrap(), 1);

    let events = all_events(&repo).await;
    let mut invitee_ids = events[0].invitee_ids();
    invitee_ids.sort();
    assert_eq!(invitee_ids, vec![alice, bob, carol]);
}

#[tokio::test]
async fn test_one_merged_event_per_group() {
    let repo = LocalRepository::new();
    let alice = seed_user(&repo, "Alice").await;
    let bob = seed_user(&repo, "Bob").await;

    // Two independent clusters.
    seed_event(&repo, "A1", EventStatus::Todo, 9, 11, &[alice]).await;
    seed_event(&repo, "A2", EventStatus::Todo, 10, 12, &[alice]).await;
    seed_event(&repo, "B1", EventStatus::Todo, 20, 22, &[bob]).await;
    seed_event(&repo, "B2", EventStatus::Todo, 21, 23, &[bob]).await;

    assert_eq!(services::merge_all(&repo).await.unwrap(), 2);

    let events = all_events(&repo).await;
    assert_eq!(events.len(), 2);
    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    assert!(titles.contains(&"A1 / A2"));
    assert!(titles.contains(&"B1 / B2"));
}

#[tokio::test]
async fn test_merge_pass_is_idempotent_under_rerun() {
    let repo = LocalRepository::new();
    let alice = seed_user(&repo, "Alice").await;

    seed_event(&repo, "A", EventStatus::Todo, 13, 15, &[alice]).await;
    seed_event(&repo, "B", EventStatus::Todo, 14, 16, &[alice]).await;

    assert_eq!(services::merge_all(&repo).await.unwrap(), 1);
    let after_first = all_events(&repo).await;

    // The merged event has no partner to merge with.
    assert_eq!(services::merge_all(&repo).await.unwrap(), 0);
    assert_eq!(all_events(&repo).await, after_first);
}

#[tokio::test]
async fn test_merge_updates_reverse_references() {
    let repo = LocalRepository::new();
    let alice = seed_user(&repo, "Alice").await;

    seed_event(&repo, "A", EventStatus::Todo, 13, 15, &[alice]).await;
    seed_event(&repo, "B", EventStatus::Todo, 14, 16, &[alice]).await;

    services::merge_all(&repo).await.unwrap();

    let events = all_events(&repo).await;
    assert_eq!(events.len(), 1);
    // The only event Alice is invited to now is the merged one.
    assert_eq!(repo.user_event_ids(alice), vec![events[0].id]);
}

#[tokio::test]
async fn test_merged_description_concatenation() {
    let repo = LocalRepository::new();
    let alice = seed_user(&repo, "Alice").await;

    repo.store_event(&NewEvent {
        title: "A".to_string(),
        description: Some("first".to_string()),
        status: EventStatus::Todo,
        start_time: hour(13),
        end_time: hour(15),
        invitee_ids: vec![alice],
    })
    .await
    .unwrap();
    repo.store_event(&NewEvent {
        title: "B".to_string(),
        description: Some("second".to_string()),
        status: EventStatus::Todo,
        start_time: hour(14),
        end_time: hour(16),
        invitee_ids: vec![alice],
    })
    .await
    .unwrap();

    services::merge_all(&repo).await.unwrap();

    let events = all_events(&repo).await;
    assert_eq!(events[0].description.as_deref(), Some("first / second"));
}
