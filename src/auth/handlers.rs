use axum::{
    extract::{rejection::JsonRejection, State},
    http::{
        header::{AUTHORIZATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RefreshRequest, SignupRequest, TokenResponse, UserResponse, ValidateResponse},
        extractors::AuthUser,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub const USER_ID_HEADER: &str = "x-user-id";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .merge(validate_routes())
}

/// Gateway-facing token check.
pub fn validate_routes() -> Router<AppState> {
    Router::new().route("/auth/validate", get(validate))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(v)| v).map_err(|e| {
        warn!(error = %e, "rejected request body");
        AppError::InvalidInput(format!("Malformed request body: {}", e.body_text()))
    })
}

/// `token` cookie mirroring the access token.
fn access_cookie(tokens: &TokenResponse) -> AppResult<HeaderMap> {
    let cookie = format!(
        "token={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        tokens.access_token, tokens.expires_in
    );
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("build cookie")))?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, value);
    Ok(headers)
}

#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> AppResult<Json<UserResponse>> {
    let req = body(payload)?;
    req.validate()?;
    let user = state
        .auth
        .signup(&req.email, &req.password, &req.nickname)
        .await?;
    Ok(Json(user))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<(HeaderMap, Json<TokenResponse>)> {
    let req = body(payload)?;
    req.validate()?;
    let tokens = state.auth.login(&req.email, &req.password).await?;
    Ok((access_cookie(&tokens)?, Json(tokens)))
}

#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<(HeaderMap, Json<TokenResponse>)> {
    let req = body(payload)?;
    req.validate()?;
    let tokens = state.auth.refresh(&req.refresh_token).await?;
    Ok((access_cookie(&tokens)?, Json(tokens)))
}

#[instrument(skip_all)]
pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<(HeaderMap, Json<ValidateResponse>)> {
    let authorization = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    let principal = state.auth.validate(authorization).await?;

    let mut out = HeaderMap::new();
    let user_id = HeaderValue::from_str(&principal.id.to_string())
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    out.insert(USER_ID_HEADER, user_id);
    Ok((out, Json(ValidateResponse::from(principal))))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> AppResult<StatusCode> {
    state.auth.logout(principal.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
