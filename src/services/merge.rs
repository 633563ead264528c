//! Overlap-merge engine.
//!
//! Finds clusters of events that transitively overlap in time AND share at
//! least one invitee, then replaces each cluster with a single merged event.
//! The whole pass runs inside one repository transaction scope: every merged
//! event is saved before its originals are deleted, and any failure rolls
//! the entire pass back.
//!
//! The engine is a one-shot batch pass. It holds no state between
//! invocations and recomputes groups from current stored data each time, so
//! re-running a failed pass is safe.

use std::collections::HashSet;

use log::{info, warn};

use crate::api::{Event, EventId, EventStatus, NewEvent, UserId};
use crate::db::repository::{
    FullRepository, RepositoryError, RepositoryResult, RepositoryTransaction,
};

/// Separator used when concatenating titles and descriptions of merged
/// events.
const MERGE_SEPARATOR: &str = " / ";

/// Compute the groups of event ids eligible for merging.
///
/// Two events overlap when the later one (in start order) begins before the
/// group's running window ends AND the two share at least one invitee.
/// Overlap is closed transitively: when an event joins a group it widens the
/// window and contributes its invitees, which can make previously rejected
/// events eligible, so the forward scan restarts after every join.
///
/// Events with an empty invitee set participate in no group. Groups with a
/// single member are discarded. The input collection is not reordered; the
/// sweep runs over a sorted index view.
///
/// # Arguments
/// * `events` - All events, invitees populated; no ordering precondition
///
/// # Returns
/// Groups of event ids, each in join order, in the order their anchor event
/// was first visited.
pub fn compute_merge_groups(events: &[Event]) -> Vec<Vec<EventId>> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_key(|event| event.start_time);

    let mut consumed = vec![false; sorted.len()];
    let mut groups: Vec<Vec<EventId>> = Vec::new();

    for i in 0..sorted.len() {
        if consumed[i] {
            continue;
        }
        if sorted[i].invitees.is_empty() {
            continue;
        }

        // Running window. Only the end grows as events join; the start is
        // never retracted. Joining events cannot begin before the anchor
        // (ascending start order), so tracking the start is unnecessary.
        let mut curr_end = sorted[i].end_time;
        let mut curr_invitees: HashSet<UserId> =
            sorted[i].invitees.iter().map(|user| user.id).collect();
        let mut group = vec![sorted[i].id];

        let mut j = i + 1;
        while j < sorted.len() {
            if consumed[j] {
                j += 1;
                continue;
            }

            let candidate = sorted[j];
            let shares_invitee = candidate
                .invitees
                .iter()
                .any(|user| curr_invitees.contains(&user.id));

            if candidate.start_time < curr_end && shares_invitee {
                if candidate.end_time > curr_end {
                    curr_end = candidate.end_time;
                }
                curr_invitees.extend(candidate.invitees.iter().map(|user| user.id));
                group.push(candidate.id);
                consumed[j] = true;
                // The widened window and invitee set may qualify events we
                // already passed over; rescan from just after the anchor.
                j = i + 1;
                continue;
            }

            if candidate.start_time >= curr_end {
                // Sorted by start time: every later candidate starts at or
                // after this one, so none can satisfy the time condition.
                break;
            }

            j += 1;
        }

        if group.len() > 1 {
            groups.push(group);
        }
    }

    groups
}

/// Reduce the statuses of a group to the merged status.
///
/// Priority: `InProgress` over `Todo` over `Completed`.
fn merged_status(members: &[Event]) -> EventStatus {
    if members
        .iter()
        .any(|event| event.status == EventStatus::InProgress)
    {
        EventStatus::InProgress
    } else if members.iter().any(|event| event.status == EventStatus::Todo) {
        EventStatus::Todo
    } else {
        EventStatus::Completed
    }
}

/// Join member descriptions in group order.
///
/// Members without a description contribute an empty string; a group where
/// no member has one yields `None`.
fn merged_description(members: &[Event]) -> Option<String> {
    if members.iter().all(|event| event.description.is_none()) {
        return None;
    }
    Some(
        members
            .iter()
            .map(|event| event.description.as_deref().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(MERGE_SEPARATOR),
    )
}

/// Union of member invitee ids, first-seen order, no duplicates.
fn union_invitee_ids(members: &[Event]) -> Vec<UserId> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for event in members {
        for user in &event.invitees {
            if seen.insert(user.id) {
                ids.push(user.id);
            }
        }
    }
    ids
}

/// Build the replacement event for a group.
///
/// `members` must be non-empty; `invitee_ids` is the re-resolved invitee
/// union for the group.
fn build_merged_event(members: &[Event], invitee_ids: Vec<UserId>) -> NewEvent {
    let mut start_time = members[0].start_time;
    let mut end_time = members[0].end_time;
    for event in &members[1..] {
        if event.start_time < start_time {
            start_time = event.start_time;
        }
        if event.end_time > end_time {
            end_time = event.end_time;
        }
    }

    let title = members
        .iter()
        .map(|event| event.title.as_str())
        .collect::<Vec<_>>()
        .join(MERGE_SEPARATOR);

    NewEvent {
        title,
        description: merged_description(members),
        status: merged_status(members),
        start_time,
        end_time,
        invitee_ids,
    }
}

/// Replace every group inside an open transaction scope.
///
/// Groups are processed strictly sequentially. Per group: members are
/// refetched (ids that vanished since grouping are skipped silently), the
/// merged event is saved first, then each surviving original is deleted. A
/// `NotFound` from a delete means the store changed under us; it propagates
/// and aborts the pass.
async fn replace_groups(
    tx: &mut dyn RepositoryTransaction,
    groups: &[Vec<EventId>],
) -> RepositoryResult<usize> {
    let mut merged = 0;

    for group in groups {
        let mut members = Vec::with_capacity(group.len());
        for &event_id in group {
            match tx.get_event(event_id).await {
                Ok(event) => members.push(event),
                Err(RepositoryError::NotFound { .. }) => continue,
                Err(err) => return Err(err),
            }
        }

        if members.is_empty() {
            continue;
        }

        let invitee_ids = union_invitee_ids(&members);
        let invitees = tx.fetch_users_by_ids(&invitee_ids).await?;
        let replacement =
            build_merged_event(&members, invitees.into_iter().map(|user| user.id).collect());

        let saved = tx.save_event(&replacement).await?;
        for member in &members {
            tx.delete_event(member.id).await?;
        }

        info!(
            "Merged {} events into event {} ('{}')",
            members.len(),
            saved.id,
            saved.title
        );
        merged += 1;
    }

    Ok(merged)
}

/// Run one merge pass over the full event set.
///
/// Fetches all events, computes merge groups, and — when any exist —
/// replaces them inside a single transaction scope. Returns the number of
/// groups that were replaced.
///
/// # Errors
/// Any repository failure aborts the pass; the transaction is rolled back
/// and no partial group replacement becomes visible.
pub async fn merge_all<R>(repo: &R) -> RepositoryResult<usize>
where
    R: FullRepository + ?Sized,
{
    let events = repo.fetch_all_events().await?;
    let groups = compute_merge_groups(&events);

    if groups.is_empty() {
        info!(
            "Merge pass: no overlapping events among {} events",
            events.len()
        );
        return Ok(0);
    }

    info!(
        "Merge pass: replacing {} groups out of {} events",
        groups.len(),
        events.len()
    );

    let mut tx = repo.begin_transaction().await?;
    match replace_groups(tx.as_mut(), &groups).await {
        Ok(merged) => {
            tx.commit().await?;
            Ok(merged)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Merge pass rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::User;
    use chrono::{TimeZone, Utc};

    fn user(id: i64) -> User {
        User {
            id: UserId::new(id),
            name: format!("user-{}", id),
        }
    }

    fn event(id: i64, start_hour: u32, end_hour: u32, invitees: &[i64]) -> Event {
        let day = Utc.with_ymd_and_hms(2024, 5, 14, 0, 0, 0).unwrap();
        Event {
            id: EventId::new(id),
            title: format!("event-{}", id),
            description: None,
            status: EventStatus::Todo,
            start_time: day + chrono::Duration::hours(start_hour as i64),
            end_time: day + chrono::Duration::hours(end_hour as i64),
            created_at: day,
            updated_at: day,
            invitees: invitees.iter().map(|&id| user(id)).collect(),
        }
    }

    fn ids(raw: &[i64]) -> Vec<EventId> {
        raw.iter().copied().map(EventId::new).collect()
    }

    #[test]
    fn test_overlapping_events_with_shared_invitee_group() {
        let events = vec![event(1, 13, 15, &[1, 2]), event(2, 14, 16, &[1])];

        let groups = compute_merge_groups(&events);
        assert_eq!(groups, vec![ids(&[1, 2])]);
    }

    #[test]
    fn test_touching_events_do_not_group() {
        // C ends exactly when D starts; `start < end` is strict.
        let events = vec![event(1, 9, 10, &[1]), event(2, 11, 12, &[1])];
        assert!(compute_merge_groups(&events).is_empty());

        let events = vec![event(1, 9, 10, &[1]), event(2, 10, 12, &[1])];
        assert!(compute_merge_groups(&events).is_empty());
    }

    #[test]
    fn test_time_overlap_without_shared_invitee_does_not_group() {
        let events = vec![event(1, 13, 15, &[1]), event(2, 14, 16, &[2])];
        assert!(compute_merge_groups(&events).is_empty());
    }

    #[test]
    fn test_empty_invitee_event_is_excluded() {
        let events = vec![event(1, 13, 15, &[]), event(2, 14, 16, &[3])];
        assert!(compute_merge_groups(&events).is_empty());
    }

    #[test]
    fn test_transitive_chain_forms_one_group() {
        // A overlaps B, B overlaps C, A does not directly overlap C.
        let events = vec![
            event(1, 9, 11, &[1]),
            event(2, 10, 13, &[1, 2]),
            event(3, 12, 14, &[2]),
        ];

        let groups = compute_merge_groups(&events);
        assert_eq!(groups, vec![ids(&[1, 2, 3])]);
    }

    #[test]
    fn test_rescan_picks_up_previously_skipped_event() {
        // B is rejected on the first scan (no shared invitee with A); once C
        // joins and contributes invitee 2, the rescan absorbs B.
        let events = vec![
            event(1, 10, 14, &[1]),
            event(2, 11, 12, &[2]),
            event(3, 12, 13, &[1, 2]),
        ];

        let groups = compute_merge_groups(&events);
        assert_eq!(groups, vec![ids(&[1, 3, 2])]);
    }

    #[test]
    fn test_window_end_extension_chains_groups() {
        // B extends the window to 16:00, which lets C (starting 15:00) join
        // even though C does not overlap A directly.
        let events = vec![
            event(1, 13, 14, &[1]),
            event(2, 13, 16, &[1]),
            event(3, 15, 17, &[1]),
        ];

        let groups = compute_merge_groups(&events);
        assert_eq!(groups, vec![ids(&[1, 2, 3])]);
    }

    #[test]
    fn test_singleton_groups_are_discarded() {
        let events = vec![event(1, 9, 10, &[1]), event(2, 12, 13, &[1])];
        assert!(compute_merge_groups(&events).is_empty());
    }

    #[test]
    fn test_unsorted_input_is_handled() {
        let events = vec![event(2, 14, 16, &[1]), event(1, 13, 15, &[1, 2])];

        let groups = compute_merge_groups(&events);
        assert_eq!(groups, vec![ids(&[1, 2])]);
    }

    #[test]
    fn test_independent_clusters_yield_separate_groups() {
        let events = vec![
            event(1, 9, 11, &[1]),
            event(2, 10, 12, &[1]),
            event(3, 20, 22, &[2]),
            event(4, 21, 23, &[2]),
        ];

        let groups = compute_merge_groups(&events);
        assert_eq!(groups, vec![ids(&[1, 2]), ids(&[3, 4])]);
    }

    #[test]
    fn test_merged_status_priority() {
        let mut a = event(1, 9, 10, &[1]);
        let mut b = event(2, 9, 10, &[1]);
        let mut c = event(3, 9, 10, &[1]);

        a.status = EventStatus::InProgress;
        b.status = EventStatus::Todo;
        c.status = EventStatus::Completed;
        assert_eq!(
            merged_status(&[a.clone(), b.clone(), c.clone()]),
            EventStatus::InProgress
        );

        a.status = EventStatus::Todo;
        assert_eq!(merged_status(&[a.clone(), c.clone()]), EventStatus::Todo);

        a.status = EventStatus::Completed;
        assert_eq!(merged_status(&[a, c]), EventStatus::Completed);
    }

    #[test]
    fn test_merged_description_join() {
        let mut a = event(1, 9, 10, &[1]);
        let mut b = event(2, 9, 10, &[1]);
        a.description = Some("alpha".to_string());

        assert_eq!(
            merged_description(&[a.clone(), b.clone()]),
            Some("alpha / ".to_string())
        );

        b.description = Some("beta".to_string());
        assert_eq!(
            merged_description(&[a.clone(), b.clone()]),
            Some("alpha / beta".to_string())
        );

        a.description = None;
        b.description = None;
        assert_eq!(merged_description(&[a, b]), None);
    }

    #[test]
    fn test_build_merged_event_unions_time_and_joins_titles() {
        let members = vec![event(1, 13, 15, &[1, 2]), event(2, 14, 16, &[1])];
        let invitee_ids = union_invitee_ids(&members);
        let merged = build_merged_event(&members, invitee_ids);

        assert_eq!(merged.title, "event-1 / event-2");
        assert_eq!(merged.start_time, members[0].start_time);
        assert_eq!(merged.end_time, members[1].end_time);
        assert_eq!(merged.invitee_ids, vec![UserId::new(1), UserId::new(2)]);
    }

    #[test]
    fn test_union_invitee_ids_deduplicates_in_order() {
        let members = vec![event(1, 9, 10, &[2, 1]), event(2, 9, 10, &[1, 3])];
        assert_eq!(
            union_invitee_ids(&members),
            vec![UserId::new(2), UserId::new(1), UserId::new(3)]
        );
    }
}
