//! In-process user directory and credential store.
//!
//! Used by tests and by [`AppState::fake`](crate::state::AppState::fake).
//! All clones share the same data; every write happens under one lock, so
//! uniqueness checks and inserts are atomic with respect to each other.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{repo::CredentialStore, repo_types::Account},
    error::{AppError, AppResult},
    users::{
        repo::UserDirectory,
        repo_types::{NewUser, Role, User, UserStatus},
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    emails: HashMap<String, Uuid>,
    accounts: Vec<Account>,
    next_account_id: i64,
}

impl Tables {
    fn account_taken(&self, provider: &str, provider_id: &str) -> bool {
        self.accounts
            .iter()
            .any(|a| a.provider == provider && a.provider_id == provider_id)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.emails.get(email).and_then(|id| t.users.get(id)).cloned())
    }

    async fn exists_by_email(&self, email: &str) -> AppResult<bool> {
        Ok(self.tables.read().await.emails.contains_key(email))
    }

    async fn create(&self, new: NewUser) -> AppResult<User> {
        if new.accounts.is_empty() {
            return Err(AppError::InvalidInput(
                "a user needs at least one account".into(),
            ));
        }

        let mut t = self.tables.write().await;
        if t.emails.contains_key(&new.email) || t.users.contains_key(&new.id) {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        for (i, a) in new.accounts.iter().enumerate() {
            let dup_in_batch = new.accounts[..i]
                .iter()
                .any(|b| b.provider == a.provider && b.provider_id == a.provider_id);
            if dup_in_batch || t.account_taken(&a.provider, &a.provider_id) {
                return Err(AppError::Conflict("Email already registered".into()));
            }
        }

        let user = User {
            id: new.id,
            email: new.email,
            nickname: new.nickname,
            role: new.role,
            status: new.status,
            created_at: OffsetDateTime::now_utc(),
        };
        for a in new.accounts {
            t.next_account_id += 1;
            let id = t.next_account_id;
            t.accounts.push(Account {
                id,
                user_id: user.id,
                provider: a.provider,
                provider_id: a.provider_id,
                password_hash: a.password_hash,
            });
        }
        t.emails.insert(user.email.clone(), user.id);
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> AppResult<User> {
        let mut t = self.tables.write().await;
        let user = t.users.get_mut(&id).ok_or_else(AppError::user_not_found)?;
        user.role = role;
        Ok(user.clone())
    }

    async fn set_status(&self, id: Uuid, status: UserStatus) -> AppResult<User> {
        let mut t = self.tables.write().await;
        let user = t.users.get_mut(&id).ok_or_else(AppError::user_not_found)?;
        user.status = status;
        Ok(user.clone())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_with_user(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> AppResult<Option<(Account, User)>> {
        let t = self.tables.read().await;
        let found = t
            .accounts
            .iter()
            .find(|a| a.provider == provider && a.provider_id == provider_id)
            .and_then(|a| t.users.get(&a.user_id).map(|u| (a.clone(), u.clone())));
        Ok(found)
    }
}
