use async_trait::async_trait;

use crate::auth::repo_types::Account;
use crate::error::AppResult;
use crate::users::repo_types::User;

/// Read side of account storage. Accounts are created only through
/// [`UserDirectory::create`](crate::users::repo::UserDirectory::create).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Finds the account for a (provider, provider_id) pair together with
    /// its owning user.
    async fn find_with_user(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> AppResult<Option<(Account, User)>>;
}
