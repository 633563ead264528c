//! User repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{NewUser, User, UserId};

/// Repository trait for user database operations.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Store a new user.
    ///
    /// Event ids in the payload are resolved and the user is added to those
    /// events' invitee lists; unknown ids are dropped silently.
    ///
    /// # Arguments
    /// * `user` - The user payload to store
    ///
    /// # Returns
    /// * `Ok(User)` - The stored user including its assigned ID
    /// * `Err(RepositoryError)` - If the operation fails
    async fn store_user(&self, user: &NewUser) -> RepositoryResult<User>;

    /// Retrieve a single user by ID.
    ///
    /// # Returns
    /// * `Ok(User)` - The user
    /// * `Err(RepositoryError::NotFound)` - If the user doesn't exist
    async fn get_user(&self, user_id: UserId) -> RepositoryResult<User>;

    /// Batch-resolve users by id.
    ///
    /// Ids that do not exist are simply absent from the result; this is not
    /// an error.
    ///
    /// # Arguments
    /// * `user_ids` - Ids to resolve (duplicates allowed)
    ///
    /// # Returns
    /// * `Ok(Vec<User>)` - Users found, at most one per distinct id
    async fn fetch_users_by_ids(&self, user_ids: &[UserId]) -> RepositoryResult<Vec<User>>;
}
