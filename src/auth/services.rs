use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::TokenKind,
        dto::{TokenResponse, UserResponse},
        jwt::JwtKeys,
        password::{hash_password, verify_dummy, verify_password},
        repo::CredentialStore,
        repo_types::{NewAccount, LOCAL_PROVIDER},
    },
    error::{AppError, AppResult},
    sessions::SessionRegistry,
    users::{
        repo::UserDirectory,
        repo_types::{NewUser, Principal, User},
    },
};

/// Trims and lowercases an email; blank input is `InvalidInput`.
pub fn normalize_email(email: &str) -> AppResult<String> {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(AppError::InvalidInput("Email cannot be empty".into()));
    }
    Ok(normalized)
}

/// Extracts the token from a `Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Signup, login, refresh, validate and logout over the user directory,
/// credential store, token codec and session registry.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    accounts: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionRegistry>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        accounts: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionRegistry>,
        keys: JwtKeys,
    ) -> Self {
        Self {
            users,
            accounts,
            sessions,
            keys,
        }
    }

    #[instrument(skip(self, password))]
    pub async fn signup(&self, email: &str, password: &str, nickname: &str) -> AppResult<UserResponse> {
        let email = normalize_email(email)?;
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(AppError::InvalidInput(
                "Validation failed: nickname must not be blank".into(),
            ));
        }
        if self.users.exists_by_email(&email).await? {
            warn!(email = %email, "email already registered");
            return Err(AppError::Conflict("Email already registered".into()));
        }

        let hash = hash_password(password).map_err(AppError::Internal)?;
        let mut user = NewUser::new(email.clone(), nickname);
        user.add_account(NewAccount::local(email, hash));

        // A concurrent signup that slipped past the check fails here with Conflict.
        let saved = self.users.create(user).await?;
        info!(user_id = %saved.id, email = %saved.email, "user signed up");
        Ok(UserResponse::from(&saved))
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<TokenResponse> {
        let email = normalize_email(email)?;
        let Some((account, user)) = self.accounts.find_with_user(LOCAL_PROVIDER, &email).await?
        else {
            verify_dummy(password);
            warn!(email = %email, "login unknown email");
            return Err(AppError::invalid_credentials());
        };

        let Some(hash) = account.password_hash.as_deref().filter(|_| account.is_local()) else {
            verify_dummy(password);
            warn!(account_id = account.id, "account has no usable password hash");
            return Err(AppError::invalid_credentials());
        };
        let ok = verify_password(password, hash).map_err(AppError::Internal)?;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::invalid_credentials());
        }

        let tokens = self.issue_tokens(&user).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(tokens)
    }

    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        let claims = self.keys.verify(refresh_token).map_err(|_| {
            warn!("refresh token failed verification");
            AppError::invalid_token()
        })?;
        if claims.token_type() != TokenKind::Refresh {
            warn!(user_id = %claims.subject(), "non-refresh token presented for refresh");
            return Err(AppError::invalid_token());
        }

        let user_id = claims.subject();
        if !self.sessions.matches(user_id, refresh_token).await? {
            warn!(user_id = %user_id, "refresh token superseded or revoked");
            return Err(AppError::invalid_token());
        }

        let user = self.users.get_by_id(user_id).await?;
        let tokens = self.issue_tokens(&user).await?;
        info!(user_id = %user.id, "tokens rotated");
        Ok(tokens)
    }

    /// Resolves a bearer header to the current state of its user. Email and
    /// role come from the directory, not from the token.
    #[instrument(skip_all)]
    pub async fn validate(&self, authorization: Option<&str>) -> AppResult<Principal> {
        let Some(token) = bearer_token(authorization) else {
            warn!("missing or malformed bearer header");
            return Err(AppError::invalid_token());
        };
        let claims = self.keys.verify(token).map_err(|_| {
            warn!("access token failed verification");
            AppError::invalid_token()
        })?;
        if claims.token_type() != TokenKind::Access {
            warn!(user_id = %claims.subject(), "non-access token presented as bearer");
            return Err(AppError::invalid_token());
        }

        let user = self.users.get_by_id(claims.subject()).await?;
        ensure_active(&user)?;
        Ok(Principal::from(&user))
    }

    /// Drops the user's refresh session; outstanding refresh tokens stop working.
    #[instrument(skip(self))]
    pub async fn logout(&self, user_id: Uuid) -> AppResult<()> {
        self.sessions.delete(user_id).await?;
        info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    /// The only writer to the session registry: every refresh token minted
    /// here is recorded before it is returned.
    async fn issue_tokens(&self, user: &User) -> AppResult<TokenResponse> {
        ensure_active(user)?;
        let access_token = self.keys.issue_access(user).map_err(AppError::Internal)?;
        let refresh_token = self.keys.issue_refresh(user.id).map_err(AppError::Internal)?;
        self.sessions
            .store(user.id, &refresh_token, self.keys.refresh_ttl())
            .await?;
        Ok(TokenResponse {
            access_token,
            refresh_token,
            expires_in: self.keys.access_ttl().as_secs(),
        })
    }
}

fn ensure_active(user: &User) -> AppResult<()> {
    if !user.is_active() {
        warn!(user_id = %user.id, status = user.status.as_str(), "inactive account");
        return Err(AppError::inactive_account());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppResult,
        state::AppState,
        users::repo_types::{Role, UserStatus},
    };
    use async_trait::async_trait;
    use std::time::Duration;

    fn service() -> (AuthService, AppState) {
        let state = AppState::fake();
        (state.auth.clone(), state)
    }

    async fn signed_up(auth: &AuthService) -> UserResponse {
        auth.signup("a@b.com", "longenough1", "Ann").await.expect("signup")
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ann@Example.COM ").unwrap(), "ann@example.com");
        assert!(matches!(normalize_email("   "), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("abc")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[tokio::test]
    async fn signup_creates_user_with_one_local_account() {
        let (auth, state) = service();
        let res = auth.signup(" A@B.com ", "longenough1", " Ann ").await.unwrap();
        assert_eq!(res.email, "a@b.com");
        assert_eq!(res.nickname, "Ann");
        assert_eq!(res.role, Role::User);

        let (account, owner) = state
            .auth
            .accounts
            .find_with_user(LOCAL_PROVIDER, "a@b.com")
            .await
            .unwrap()
            .expect("local account created with the user");
        assert_eq!(owner.id, res.id);
        assert_eq!(account.user_id, res.id);
        let hash = account.password_hash.as_deref().unwrap();
        assert_ne!(hash, "longenough1");
        assert!(verify_password("longenough1", hash).unwrap());
    }

    #[tokio::test]
    async fn blank_nickname_is_rejected_without_creating_user() {
        let (auth, state) = service();
        let err = auth.signup("a@b.com", "longenough1", "   ").await.unwrap_err();
        match err {
            AppError::InvalidInput(msg) => assert!(msg.contains("nickname"), "{msg}"),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
        assert!(!state.users.exists_by_email("a@b.com").await.unwrap());
    }

    #[tokio::test]
    async fn signup_with_same_email_in_other_case_conflicts() {
        let (auth, _) = service();
        signed_up(&auth).await;
        let err = auth.signup("A@B.COM", "anotherpass", "Bob").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn login_issues_verifiable_pair() {
        let (auth, _) = service();
        let user = signed_up(&auth).await;
        let tokens = auth.login("A@b.com ", "longenough1").await.unwrap();
        assert_eq!(tokens.expires_in, auth.keys.access_ttl().as_secs());

        let access = auth.keys.verify(&tokens.access_token).unwrap();
        assert_eq!(access.token_type(), TokenKind::Access);
        assert_eq!(access.subject(), user.id);
        assert_eq!(access.email.as_deref(), Some("a@b.com"));
        assert_eq!(access.role, Some(Role::User));

        let refresh = auth.keys.verify(&tokens.refresh_token).unwrap();
        assert_eq!(refresh.token_type(), TokenKind::Refresh);
        assert!(auth.sessions.matches(user.id, &tokens.refresh_token).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let (auth, _) = service();
        signed_up(&auth).await;
        let wrong_pw = auth.login("a@b.com", "wrongpassword").await.unwrap_err();
        let unknown = auth.login("nobody@b.com", "longenough1").await.unwrap_err();
        assert!(matches!(wrong_pw, AppError::Unauthorized(_)));
        assert!(matches!(unknown, AppError::Unauthorized(_)));
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn suspended_user_cannot_login() {
        let (auth, state) = service();
        let user = signed_up(&auth).await;
        state.users.set_status(user.id, UserStatus::Suspended).await.unwrap();

        let err = auth.login("a@b.com", "longenough1").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        // wrong password still reads as bad credentials, not as suspended
        let err = auth.login("a@b.com", "wrongpassword").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn refresh_rotates_and_old_token_stops_working() {
        let (auth, _) = service();
        signed_up(&auth).await;
        let first = auth.login("a@b.com", "longenough1").await.unwrap();

        let second = auth.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        let err = auth.refresh(&first.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(auth.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn later_login_supersedes_earlier_refresh_token() {
        let (auth, _) = service();
        signed_up(&auth).await;
        let earlier = auth.login("a@b.com", "longenough1").await.unwrap();
        auth.login("a@b.com", "longenough1").await.unwrap();

        let err = auth.refresh(&earlier.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn access_token_cannot_be_used_to_refresh() {
        let (auth, _) = service();
        signed_up(&auth).await;
        let tokens = auth.login("a@b.com", "longenough1").await.unwrap();
        let err = auth.refresh(&tokens.access_token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn refresh_for_suspended_user_is_forbidden() {
        let (auth, state) = service();
        let user = signed_up(&auth).await;
        let tokens = auth.login("a@b.com", "longenough1").await.unwrap();
        state.users.set_status(user.id, UserStatus::Suspended).await.unwrap();

        let err = auth.refresh(&tokens.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn refresh_for_vanished_user_is_not_found() {
        let (auth, _) = service();
        let ghost = Uuid::new_v4();
        let token = auth.keys.issue_refresh(ghost).unwrap();
        auth.sessions
            .store(ghost, &token, Duration::from_secs(60))
            .await
            .unwrap();
        let err = auth.refresh(&token).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn garbage_refresh_token_is_unauthorized() {
        let (auth, _) = service();
        let err = auth.refresh("definitely-not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn validate_reflects_current_role_not_token_claim() {
        let (auth, state) = service();
        let user = signed_up(&auth).await;
        let tokens = auth.login("a@b.com", "longenough1").await.unwrap();
        state.users.set_role(user.id, Role::Admin).await.unwrap();

        let principal = auth.validate(Some(&bearer(&tokens.access_token))).await.unwrap();
        assert_eq!(principal.id, user.id);
        assert_eq!(principal.email, "a@b.com");
        assert_eq!(principal.role, Role::Admin);
        let stale = auth.keys.verify(&tokens.access_token).unwrap();
        assert_eq!(stale.role, Some(Role::User));
    }

    #[tokio::test]
    async fn validate_rejects_suspended_user() {
        let (auth, state) = service();
        let user = signed_up(&auth).await;
        let tokens = auth.login("a@b.com", "longenough1").await.unwrap();
        state.users.set_status(user.id, UserStatus::Suspended).await.unwrap();

        let err = auth.validate(Some(&bearer(&tokens.access_token))).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn validate_rejects_refresh_tokens_and_bad_headers() {
        let (auth, _) = service();
        signed_up(&auth).await;
        let tokens = auth.login("a@b.com", "longenough1").await.unwrap();

        for header in [
            Some(bearer(&tokens.refresh_token)),
            Some(tokens.access_token.clone()),
            Some(format!("Basic {}", tokens.access_token)),
            Some("Bearer garbage".to_string()),
            None,
        ] {
            let err = auth.validate(header.as_deref()).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)), "{header:?}");
        }
    }

    #[tokio::test]
    async fn logout_revokes_refresh_but_not_access() {
        let (auth, _) = service();
        let user = signed_up(&auth).await;
        let tokens = auth.login("a@b.com", "longenough1").await.unwrap();
        auth.logout(user.id).await.unwrap();

        let err = auth.refresh(&tokens.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(auth.validate(Some(&bearer(&tokens.access_token))).await.is_ok());
    }

    struct DownRegistry;

    #[async_trait]
    impl SessionRegistry for DownRegistry {
        async fn store(&self, _: Uuid, _: &str, _: Duration) -> AppResult<()> {
            Err(AppError::Infrastructure(anyhow::anyhow!("connection refused")))
        }
        async fn matches(&self, _: Uuid, _: &str) -> AppResult<bool> {
            Err(AppError::Infrastructure(anyhow::anyhow!("connection refused")))
        }
        async fn delete(&self, _: Uuid) -> AppResult<()> {
            Err(AppError::Infrastructure(anyhow::anyhow!("connection refused")))
        }
    }

    #[tokio::test]
    async fn unreachable_registry_fails_login_instead_of_issuing_tokens() {
        let state = AppState::fake();
        let auth = AuthService::new(
            state.users.clone(),
            state.auth.accounts.clone(),
            Arc::new(DownRegistry),
            state.auth.keys.clone(),
        );
        signed_up(&auth).await;
        let err = auth.login("a@b.com", "longenough1").await.unwrap_err();
        assert!(matches!(err, AppError::Infrastructure(_)));
    }

    #[tokio::test]
    async fn local_account_without_hash_cannot_login() {
        let (auth, state) = service();
        let mut user = NewUser::new("gh@b.com", "Gee");
        user.add_account(NewAccount {
            provider: LOCAL_PROVIDER.into(),
            provider_id: "gh@b.com".into(),
            password_hash: None,
        });
        state.users.create(user).await.unwrap();
        let err = auth.login("gh@b.com", "whatever1").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
