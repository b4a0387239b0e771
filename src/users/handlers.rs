use axum::{
    extract::State,
    http::header::{CACHE_CONTROL, EXPIRES, PRAGMA},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{dto::UserResponse, extractors::AuthUser},
    error::AppResult,
    state::AppState,
};

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me))
}

#[instrument(skip_all, fields(user_id = %principal.id))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> AppResult<([(axum::http::HeaderName, &'static str); 3], Json<UserResponse>)> {
    let user = state.users.get_by_id(principal.id).await?;
    Ok((
        [
            (CACHE_CONTROL, "no-store"),
            (PRAGMA, "no-cache"),
            (EXPIRES, "0"),
        ],
        Json(UserResponse::from(&user)),
    ))
}
