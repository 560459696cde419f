//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, logout and password reset.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use homework_core::forms::ValidationError;
use homework_core::ports::PortError;
use homework_core::query::AuthEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::middleware::{session_id, SESSION_COOKIE};
use crate::web::rest::{ContextDto, ProfileDto};
use crate::web::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;
const RESET_TOKEN_HOURS: i64 = 1;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub profile: ProfileDto,
    pub context: ContextDto,
}

#[derive(Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::required("email"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email.to_string()),
        _ => Err(ValidationError::new("email", "is not a valid address")),
    }
}

fn validate_password(field: &'static str, password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            field,
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

/// Opens a session for `user_id` and returns the `Set-Cookie` value.
async fn open_session(state: &AppState, user_id: Uuid) -> ApiResult<String> {
    let auth_session_id = Uuid::new_v4().to_string();
    let lifetime = Duration::days(state.config.session_days);
    state
        .accounts
        .create_auth_session(&auth_session_id, user_id, Utc::now() + lifetime)
        .await?;
    state.publish(AuthEvent::SignedIn(user_id));
    Ok(format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        auth_session_id,
        lifetime.num_seconds()
    ))
}

fn invalid_credentials() -> ApiError {
    ApiError::Port(PortError::Unauthorized)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Invalid email or password")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = validate_email(&req.email)?;
    validate_password("password", &req.password)?;

    let password_hash = hash_password(&req.password)?;
    let user = state
        .accounts
        .create_user_with_email(&email, &password_hash)
        .await?;
    let email = user.email.unwrap_or(email);
    state.profiles.get_or_create(user.user_id, Some(&email)).await?;

    let cookie = open_session(&state, user.user_id).await?;
    info!(user_id = %user.user_id, "User signed up");

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            user_id: user.user_id,
            email,
        }),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_creds = match state.accounts.get_user_by_email(req.email.trim()).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => return Err(invalid_credentials()),
        Err(e) => return Err(e.into()),
    };

    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        debug!(user_id = %user_creds.user_id, "Password mismatch");
        return Err(invalid_credentials());
    }

    let cookie = open_session(&state, user_creds.user_id).await?;
    info!(user_id = %user_creds.user_id, "User signed in");

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            user_id: user_creds.user_id,
            email: user_creds.email,
        }),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let auth_session_id = session_id(&headers).ok_or(PortError::Unauthorized)?;

    // An expired session still gets deleted; only a live one has a user to notify.
    let user_id = state.accounts.validate_auth_session(auth_session_id).await.ok();
    state.accounts.delete_auth_session(auth_session_id).await?;
    if let Some(user_id) = user_id {
        state.publish(AuthEvent::SignedOut(user_id));
        info!(%user_id, "User signed out");
    }

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

/// GET /auth/session - The signed-in user with profile and UI context
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Active session", body = SessionResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    let user = state.accounts.get_user(user_id).await?;
    let profile = state
        .profiles
        .get_or_create(user_id, user.email.as_deref())
        .await?;
    Ok(Json(SessionResponse {
        user_id,
        profile: profile.into(),
        context: state.contexts.get(user_id).into(),
    }))
}

/// POST /auth/password-reset - Issue a reset token
///
/// Always answers 202 so the response does not reveal which emails exist.
#[utoipa::path(
    post,
    path = "/auth/password-reset",
    request_body = PasswordResetRequest,
    responses((status = 202, description = "Reset requested"))
)]
pub async fn request_password_reset_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetRequest>,
) -> ApiResult<StatusCode> {
    let user = match state.accounts.get_user_by_email(req.email.trim()).await {
        Ok(user) => user,
        Err(PortError::NotFound(_)) => {
            debug!("Password reset requested for unknown email");
            return Ok(StatusCode::ACCEPTED);
        }
        Err(e) => return Err(e.into()),
    };

    let token = Uuid::new_v4().simple().to_string();
    let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_HOURS);
    state
        .accounts
        .create_password_reset(&token, user.user_id, expires_at)
        .await?;
    // Delivery is out of band; the token is only ever logged at debug level.
    debug!(user_id = %user.user_id, %token, "Password reset token issued");
    info!(user_id = %user.user_id, "Password reset requested");
    Ok(StatusCode::ACCEPTED)
}

/// POST /auth/password-reset/confirm - Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/auth/password-reset/confirm",
    request_body = PasswordResetConfirm,
    responses(
        (status = 204, description = "Password changed"),
        (status = 404, description = "Unknown, used or expired token"),
        (status = 422, description = "Password too short")
    )
)]
pub async fn confirm_password_reset_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetConfirm>,
) -> ApiResult<StatusCode> {
    validate_password("new_password", &req.new_password)?;
    let password_hash = hash_password(&req.new_password)?;
    let user_id = state.accounts.consume_password_reset(req.token.trim()).await?;
    state.accounts.update_password(user_id, &password_hash).await?;
    info!(%user_id, "Password reset completed");
    Ok(StatusCode::NO_CONTENT)
}
