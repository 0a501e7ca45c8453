use std::sync::Arc;
use std::time::Duration;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, info};

use agora_db::{DbError, Repository};
use agora_gateway::Hub;
use agora_token::{TokenAuthority, TokenError};
use agora_types::api::{LoginRequest, SessionResponse, SignupRequest};

use crate::error::ApiError;
use crate::validate::{is_valid_password, is_valid_username};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
pub const USERNAME_COOKIE: &str = "username";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<dyn Repository>,
    pub tokens: TokenAuthority,
    pub hub: Hub,
    pub session: SessionSettings,
}

/// Credential lifetimes and the cookies they travel in.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub access_cookie_path: String,
    pub refresh_cookie_path: String,
    pub username_cookie_path: String,
    /// Mark cookies `Secure`. On in production.
    pub secure_cookies: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(24 * 60 * 60),
            access_cookie_path: "/api".into(),
            refresh_cookie_path: "/api/refresh".into(),
            username_cookie_path: "/".into(),
            secure_cookies: false,
        }
    }
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let Json(req) = req.map_err(|e| {
        debug!("Rejected signup body: {}", e);
        ApiError::BadRequest("invalid credentials".into())
    })?;

    check_credentials(&req.username, &req.password)?;

    // Hashing and the insert both block; keep them off the runtime.
    let db = state.db.clone();
    let username = req.username.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("hashing password: {}", e)))?
            .to_string();

        db.add_user(&username, &password_hash).map_err(|e| {
            match e.downcast_ref::<DbError>() {
                Some(DbError::UsernameTaken) => ApiError::Forbidden(DbError::UsernameTaken.to_string()),
                None => ApiError::Internal(e),
            }
        })?;
        Ok(())
    })
    .await
    .map_err(|e| ApiError::Internal(e.into()))??;

    info!("New account: {}", req.username);
    start_session(&state, jar, &req.username)
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let Json(req) = req.map_err(|e| {
        debug!("Rejected login body: {}", e);
        ApiError::BadRequest("invalid credentials".into())
    })?;
    check_credentials(&req.username, &req.password)?;

    let db = state.db.clone();
    let username = req.username.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        let user = db
            .get_user(&username)?
            .ok_or_else(|| ApiError::NotFound("this username doesn't have an account".into()))?;

        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash for {}: {}", username, e)))?;

        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized("wrong password".into()))
    })
    .await
    .map_err(|e| ApiError::Internal(e.into()))??;

    debug!("{} logged in", req.username);
    start_session(&state, jar, &req.username)
}

/// Trade a valid refresh credential for a fresh access credential.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::Unauthorized("no refresh token provided".into()))?;

    let payload = state.tokens.verify(&token).map_err(|e| match e {
        TokenError::Expired => ApiError::Unauthorized("expired refresh token".into()),
        _ => ApiError::Unauthorized("invalid refresh token".into()),
    })?;

    let settings = &state.session;
    let (access, access_payload) = issue(&state.tokens, &payload.subject, settings.access_token_ttl)?;
    let jar = jar
        .add(session_cookie(ACCESS_TOKEN_COOKIE, access, &settings.access_cookie_path, true, settings))
        .add(session_cookie(USERNAME_COOKIE, payload.subject.clone(), &settings.username_cookie_path, false, settings));

    Ok((
        jar,
        Json(SessionResponse {
            username: payload.subject,
            access_token_expires_at: access_payload.expires_at,
            refresh_token_expires_at: None,
        }),
    ))
}

/// Reject malformed input before touching the store.
fn check_credentials(username: &str, password: &str) -> Result<(), ApiError> {
    if !is_valid_username(username) {
        return Err(ApiError::BadRequest("invalid username".into()));
    }
    if !is_valid_password(password) {
        return Err(ApiError::BadRequest("invalid password".into()));
    }
    Ok(())
}

/// Issue both credentials for `username` and attach them as cookies.
fn start_session(
    state: &AppState,
    jar: CookieJar,
    username: &str,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let settings = &state.session;
    let (access, access_payload) = issue(&state.tokens, username, settings.access_token_ttl)?;
    let (refresh, refresh_payload) = issue(&state.tokens, username, settings.refresh_token_ttl)?;

    let jar = jar
        .add(session_cookie(ACCESS_TOKEN_COOKIE, access, &settings.access_cookie_path, true, settings))
        .add(session_cookie(REFRESH_TOKEN_COOKIE, refresh, &settings.refresh_cookie_path, true, settings))
        .add(session_cookie(USERNAME_COOKIE, username.to_string(), &settings.username_cookie_path, false, settings));

    Ok((
        jar,
        Json(SessionResponse {
            username: username.to_string(),
            access_token_expires_at: access_payload.expires_at,
            refresh_token_expires_at: Some(refresh_payload.expires_at),
        }),
    ))
}

fn issue(
    tokens: &TokenAuthority,
    username: &str,
    ttl: Duration,
) -> Result<(String, agora_token::Payload), ApiError> {
    tokens
        .issue(username, ttl)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("issuing token for {}: {}", username, e)))
}

fn session_cookie(
    name: &'static str,
    value: String,
    path: &str,
    http_only: bool,
    settings: &SessionSettings,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path(path.to_string())
        .http_only(http_only)
        .secure(settings.secure_cookies)
        .same_site(SameSite::Strict)
        .build()
}
