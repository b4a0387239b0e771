use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::users::repo_types::{NewUser, Role, User, UserStatus};

/// Lookup and creation of user records. Holds no auth policy.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn exists_by_email(&self, email: &str) -> AppResult<bool>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        self.find_by_id(id).await?.ok_or_else(AppError::user_not_found)
    }

    async fn get_by_email(&self, email: &str) -> AppResult<User> {
        self.find_by_email(email)
            .await?
            .ok_or_else(AppError::user_not_found)
    }

    /// Persists the user and all of `new.accounts` as one unit. Fails with
    /// `Conflict` if the email or any (provider, provider_id) pair is taken.
    async fn create(&self, new: NewUser) -> AppResult<User>;

    async fn set_role(&self, id: Uuid, role: Role) -> AppResult<User>;

    async fn set_status(&self, id: Uuid, status: UserStatus) -> AppResult<User>;
}
