use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::NewAccount;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            other => anyhow::bail!("unknown role {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
        }
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "SUSPENDED" => Ok(Self::Suspended),
            other => anyhow::bail!("unknown user status {other:?}"),
        }
    }
}

/// User record in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String, // always trimmed + lowercase
    pub nickname: String,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Raw `users` row; role and status are stored as text.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub role: String,
    pub status: String,
    pub created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            nickname: r.nickname,
            role: r.role.parse()?,
            status: r.status.parse()?,
            created_at: r.created_at,
        })
    }
}

/// A user that has not been persisted yet, together with the accounts
/// that must be written with it.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub role: Role,
    pub status: UserStatus,
    pub accounts: Vec<NewAccount>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self::with_id(None, email, nickname)
    }

    /// Uses `id` when given, otherwise assigns a fresh one.
    pub fn with_id(id: Option<Uuid>, email: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.unwrap_or_else(Uuid::new_v4),
            email: email.into(),
            nickname: nickname.into(),
            role: Role::default(),
            status: UserStatus::default(),
            accounts: Vec::new(),
        }
    }

    pub fn add_account(&mut self, account: NewAccount) {
        self.accounts.push(account);
    }
}

/// Read-only view of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<&User> for Principal {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            role: u.role,
        }
    }
}
