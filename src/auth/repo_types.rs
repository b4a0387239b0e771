use sqlx::FromRow;
use uuid::Uuid;

/// Provider tag for password-based accounts.
pub const LOCAL_PROVIDER: &str = "LOCAL";

/// Credential binding of a user under some provider.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Account {
    pub id: i64,
    pub user_id: Uuid,
    pub provider: String,
    pub provider_id: String, // normalized email for LOCAL
    pub password_hash: Option<String>, // Argon2 PHC string, LOCAL only
}

impl Account {
    pub fn is_local(&self) -> bool {
        self.provider == LOCAL_PROVIDER
    }
}

/// Account to be written together with its owning user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub provider: String,
    pub provider_id: String,
    pub password_hash: Option<String>,
}

impl NewAccount {
    pub fn local(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            provider: LOCAL_PROVIDER.to_string(),
            provider_id: email.into(),
            password_hash: Some(password_hash.into()),
        }
    }

    #[cfg(test)]
    pub fn external(provider: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            provider_id: provider_id.into(),
            password_hash: None,
        }
    }
}
