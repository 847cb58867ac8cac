//! Signup, login and current-user endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{ApiError, AppState, JsonBody};
use crate::auth::{AuthError, AuthState, AuthUser};
use crate::store::User;

const MIN_USERNAME_CHARS: usize = 3;
const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub age: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Token plus the account it belongs to
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Validated signup fields
#[derive(Debug, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub age: u32,
}

/// Parse an age from JSON: an integer in 1..=100
pub fn parse_age(value: &Value) -> Option<u32> {
    value
        .as_i64()
        .filter(|age| (1..=100).contains(age))
        .map(|age| age as u32)
}

pub fn validate_signup(req: SignupRequest) -> Result<NewAccount, ApiError> {
    let username = req.username.unwrap_or_default().trim().to_string();
    let password = req.password.unwrap_or_default();

    // Zero and null count as missing
    let age = req.age.filter(|a| !a.is_null() && a.as_i64() != Some(0));

    let Some(age) = age.filter(|_| !username.is_empty() && !password.is_empty()) else {
        return Err(ApiError::validation("Username, password and age are required"));
    };

    if username.chars().count() < MIN_USERNAME_CHARS {
        return Err(ApiError::validation("Username must be at least 3 characters"));
    }

    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::validation("Password must be at least 6 characters"));
    }

    let age = parse_age(&age).ok_or_else(|| ApiError::validation("Age must be between 1 and 100"))?;

    Ok(NewAccount { username, password, age })
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let account = validate_signup(req)?;

    let hash = AuthState::hash_password(&account.password)?;
    let user = state.store.create_user(&account.username, &hash, account.age)?;
    let token = state.auth.issue_token(user.id)?;

    info!("New account: {} ({})", user.username, user.id);
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let username = req.username.unwrap_or_default().trim().to_string();
    let password = req.password.unwrap_or_default();

    if username.is_empty() || password.is_empty() {
        return Err(ApiError::validation("Username and password are required"));
    }

    let user = state
        .store
        .find_user_by_username(&username)?
        .ok_or(AuthError::InvalidCredentials)?;

    if !AuthState::verify_password(&password, &user.password_hash)? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.auth.issue_token(user.id)?;
    Ok(Json(AuthResponse { token, user }))
}

/// GET /auth/me
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<User>, ApiError> {
    state
        .store
        .get_user(auth.user_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User not found"))
}
