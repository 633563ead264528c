//! User operations.

use log::info;

use crate::api::{NewUser, User};
use crate::db::repository::{FullRepository, RepositoryResult};

/// Create a new user.
///
/// Optional event ids are resolved on persist and the user is added to
/// those events' invitee lists; unknown ids are dropped silently.
pub async fn create_user<R>(repo: &R, new_user: NewUser) -> RepositoryResult<User>
where
    R: FullRepository + ?Sized,
{
    let user = repo.store_user(&new_user).await?;
    info!("Created user {} ('{}')", user.id, user.name);
    Ok(user)
}
