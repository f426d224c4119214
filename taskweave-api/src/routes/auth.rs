/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Create an account
/// - `POST /v1/auth/login` - Verify credentials and set both session cookies
/// - `POST /v1/auth/logout` - Clear both session cookies
/// - `GET /v1/auth/me` - Current identity (session required)
///
/// Tokens never appear in response bodies; they travel only as `HttpOnly`
/// cookies (see [`crate::middleware::session`]).

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::ApiJson,
    middleware::session::CookieCarrier,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskweave_shared::{
    auth::{password, session::Identity},
    models::{Account, AccountRole, NewAccount},
};
use uuid::Uuid;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (will be validated for strength)
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Public view of an account
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub role: AccountRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            role: account.role,
            is_active: account.is_active,
            created_at: account.created_at,
        }
    }
}

/// Register a new account
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "SecureP@ss123"
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email already registered (compared case-insensitively)
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    req.validate()?;

    password::validate_password_strength(&req.password).map_err(|e| {
        ApiError::ValidationError(vec![ValidationErrorDetail::new("password", e)])
    })?;

    let password_hash = password::hash_password(&req.password)?;

    let account = state
        .accounts
        .create_account(NewAccount::user(&req.email, password_hash), state.clock.now())
        .await?;

    tracing::info!(account_id = %account.id, "Account registered");

    Ok((StatusCode::CREATED, Json(account.into())))
}

/// Login endpoint
///
/// Verifies the password and starts a session: both cookies are set on the
/// response and the body carries the identity.
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email, wrong password, or inactive account
/// - `422 Unprocessable Entity`: Validation failed
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<Identity>)> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let account = state
        .accounts
        .find_account_by_email(&req.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &account.password_hash)? {
        tracing::warn!(account_id = %account.id, "Login with wrong password");
        return Err(invalid());
    }

    let mut carrier = CookieCarrier::new(jar, state.cookie_policy);
    let identity = state.guard.establish(&account, &mut carrier)?;

    Ok((carrier.into_jar(), Json(identity)))
}

/// Logout endpoint
///
/// Clears both cookies. Works with or without a live session.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, StatusCode) {
    let mut carrier = CookieCarrier::new(jar, state.cookie_policy);
    state.guard.end(&mut carrier);

    (carrier.into_jar(), StatusCode::NO_CONTENT)
}

/// Current identity
pub async fn me(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}
