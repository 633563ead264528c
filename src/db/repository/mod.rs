//! Repository trait definitions for database operations.
//!
//! This module provides a collection of focused repository traits that
//! abstract database operations. By splitting responsibilities across
//! multiple traits, implementations can be more focused and testable.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for repository operations
//! - [`event`]: Core CRUD operations for events
//! - [`user`]: User storage and batch lookup
//! - [`transaction`]: Transaction scope for atomic multi-step operations
//!
//! # Trait Composition
//!
//! A complete repository implementation implements all traits:
//!
//! ```ignore
//! impl EventRepository for MyRepo { ... }
//! impl UserRepository for MyRepo { ... }
//! impl TransactionalRepository for MyRepo { ... }
//! ```
//!
//! # Convenience Trait Bound
//!
//! For functions that need all repository capabilities, use the
//! [`FullRepository`] trait bound:
//!
//! ```ignore
//! async fn my_service<R: FullRepository>(repo: &R) -> RepositoryResult<()> {
//!     let events = repo.fetch_all_events().await?;
//!     let tx = repo.begin_transaction().await?;
//!     // ...
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod event;
pub mod transaction;
pub mod user;

// Re-export error types
pub use error::{ErrorContext, RepositoryError, RepositoryResult};

// Re-export all traits
pub use event::EventRepository;
pub use transaction::{RepositoryTransaction, TransactionalRepository};
pub use user::UserRepository;

/// Composite trait bound for a complete repository implementation.
///
/// Automatically implemented for any type that implements the three
/// repository traits. Use this as a convenient bound when you need access
/// to all repository operations.
pub trait FullRepository: EventRepository + UserRepository + TransactionalRepository {}

// Blanket implementation: any type implementing all three traits automatically implements FullRepository
impl<T> FullRepository for T where T: EventRepository + UserRepository + TransactionalRepository {}
