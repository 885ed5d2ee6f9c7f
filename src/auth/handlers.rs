use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{
    auth::{
        cookie::{cleared_cookie, session_cookie, session_token},
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, PublicUser,
            RegisterRequest, UpdateProfileRequest,
        },
        extractors::{AuthUser, JsonBody},
        jwt::JwtKeys,
        services,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout).post(logout))
        .route("/status", get(session_status))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).patch(update_profile))
        .route("/password", patch(change_password))
}

fn with_session(jar: CookieJar, keys: &JwtKeys, token: &str) -> CookieJar {
    jar.add(session_cookie(
        token.to_owned(),
        keys.expires_at(OffsetDateTime::now_utc()),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let res = services::register(state.users.as_ref(), &keys, payload).await?;
    let jar = with_session(jar, &keys, &res.token);
    Ok((StatusCode::CREATED, jar, Json(res)))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let res = services::login(state.users.as_ref(), &keys, payload).await?;
    let jar = with_session(jar, &keys, &res.token);
    Ok((jar, Json(res)))
}

#[instrument(skip(jar))]
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    info!("session cookie cleared");
    (
        jar.add(cleared_cookie()),
        Json(MessageResponse::new("Successfully Logged Out")),
    )
}

#[instrument(skip(state, jar))]
pub async fn session_status(State(state): State<AppState>, jar: CookieJar) -> Json<bool> {
    let keys = JwtKeys::from_ref(&state);
    Json(services::session_status(&keys, session_token(&jar)))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = services::get_profile(state.users.as_ref(), user_id).await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = services::update_profile(state.users.as_ref(), user_id, payload).await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::change_password(state.users.as_ref(), user_id, payload).await?;
    Ok(Json(MessageResponse::new("Password change successful")))
}
