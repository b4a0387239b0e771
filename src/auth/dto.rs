use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::users::repo_types::{Principal, Role, User};

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email.trim())
}

fn invalid(field: &str, reason: &str) -> AppError {
    AppError::InvalidInput(format!("Validation failed: {field} {reason}"))
}

fn require(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be blank"));
    }
    Ok(())
}

/// Request body for signup.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub nickname: String,
}

impl SignupRequest {
    /// Reports the first offending field only.
    pub fn validate(&self) -> AppResult<()> {
        require("email", &self.email)?;
        if !is_valid_email(&self.email) {
            return Err(invalid("email", "must be a valid email"));
        }
        require("password", &self.password)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(invalid(
                "password",
                &format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        require("nickname", &self.nickname)
    }
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> AppResult<()> {
        require("email", &self.email)?;
        require("password", &self.password)
    }
}

/// Request body for token refresh.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl RefreshRequest {
    pub fn validate(&self) -> AppResult<()> {
        require("refreshToken", &self.refresh_token)
    }
}

/// Public projection of a user; never carries credentials.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub role: Role,
}

impl From<&User> for UserResponse {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            nickname: u.nickname.clone(),
            role: u.role,
        }
    }
}

/// Returned by login and refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64, // access token lifetime, seconds
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<Principal> for ValidateResponse {
    fn from(p: Principal) -> Self {
        Self {
            user_id: p.id,
            email: p.email,
            role: p.role,
        }
    }
}
