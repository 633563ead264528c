//! High-level business logic.
//!
//! Service functions are repository-agnostic: they take any
//! [`FullRepository`](crate::db::repository::FullRepository) implementation
//! and contain the behavior that must be consistent regardless of the
//! storage backend. The overlap-merge engine lives in [`merge`].

pub mod events;
pub mod merge;
pub mod users;

pub use events::{create_event, delete_event, get_event};
pub use merge::{compute_merge_groups, merge_all};
pub use users::create_user;
