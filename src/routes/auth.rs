//! Auth routes — email/password accounts and cookie sessions.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use crate::error::ApiError;
use crate::services::account::{self, AccountError, User};
use crate::services::session::{self, SessionUser};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

pub(crate) fn account_error(err: AccountError) -> ApiError {
    let status = match &err {
        AccountError::InvalidEmail
        | AccountError::WeakPassword
        | AccountError::InvalidName
        | AccountError::InvalidAge => StatusCode::BAD_REQUEST,
        AccountError::EmailTaken => StatusCode::CONFLICT,
        AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AccountError::NotFound(_) => StatusCode::NOT_FOUND,
        AccountError::Hash(_) | AccountError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::from_err(status, &err)
}

fn session_cookie(token: String, secure: bool, ttl_hours: i64) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::hours(ttl_hours))
        .build()
}

fn cleared_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: SessionUser,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::unauthorized());
        }

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, token)
            .await
            .map_err(|e| account_error(AccountError::Database(e)))?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(Self { user, token: token.to_owned() })
    }
}

/// Like [`AuthUser`], but also requires the admin role.
pub struct AdminUser(pub SessionUser);

impl<S> axum::extract::FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if !auth.user.is_admin() {
            tracing::info!(user_id = %auth.user.id, "admin route refused");
            return Err(ApiError::forbidden());
        }
        Ok(Self(auth.user))
    }
}

/// Caller id when a session is present, without rejecting anonymous callers.
pub struct MaybeUser(pub Option<SessionUser>);

impl<S> axum::extract::FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(auth) => Ok(Self(Some(auth.user))),
            Err(e) if e.status == StatusCode::UNAUTHORIZED => Ok(Self(None)),
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct SignupBody {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

async fn start_session(state: &AppState, user: User) -> Result<(CookieJar, Json<User>), ApiError> {
    let ttl = state.config.auth.session_ttl_hours;
    let token = session::create_session(&state.pool, user.id, ttl)
        .await
        .map_err(|e| account_error(AccountError::Database(e)))?;
    let jar = CookieJar::new().add(session_cookie(token, state.config.auth.cookie_secure, ttl));
    Ok((jar, Json(user)))
}

/// `POST /api/auth/signup` — create an account and sign in.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user = account::signup(&state.pool, &body.email, &body.password, &body.name, &state.config.auth.admin_emails)
        .await
        .map_err(account_error)?;
    let (jar, user) = start_session(&state, user).await?;
    Ok((StatusCode::CREATED, jar, user))
}

/// `POST /api/auth/login` — verify credentials and set the session cookie.
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Result<impl IntoResponse, ApiError> {
    let user = account::login(&state.pool, &body.email, &body.password)
        .await
        .map_err(account_error)?;
    tracing::info!(user_id = %user.id, "login");
    start_session(&state, user).await
}

/// `GET /api/auth/me` — return current user with profile.
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<User>, ApiError> {
    let user = account::get_user(&state.pool, auth.user.id)
        .await
        .map_err(account_error)?;
    Ok(Json(user))
}

/// `POST /api/auth/logout` — delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, user_id = %auth.user.id, "session delete failed");
    }
    let jar = CookieJar::new().add(cleared_cookie(state.config.auth.cookie_secure));
    (jar, StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
