//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API, the stateless per-kind check endpoints,
//! and the local media directory under a single Axum router.

pub mod admin;
pub mod auth;
pub mod documents;
pub mod form;
pub mod profile;
pub mod verify;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Multipart framing allowance on top of the file size limit.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Count one unit of extraction work against `client`.
///
/// # Errors
///
/// Returns a 429 error when a per-client or global window is full.
pub(crate) fn enforce_rate_limit(state: &AppState, client: Uuid) -> Result<(), ApiError> {
    state.rate_limiter.check_and_record(client).map_err(|e| {
        tracing::info!(%client, error = %e, "rate limited");
        ApiError::from_err(StatusCode::TOO_MANY_REQUESTS, &e)
    })
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ssc/", post(verify::verify_ssc))
        .route("/api/cet/", post(verify::verify_cet))
        .route("/api/domicile/", post(verify::verify_domicile))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/profile", get(profile::get_profile).patch(profile::update_profile))
        .route("/api/documents", get(documents::list_mine))
        .route("/api/documents/{id}", get(documents::get_document).post(documents::submit))
        .route("/api/documents/{id}/verify", post(documents::reverify))
        .route("/api/admin/documents", get(admin::list_documents))
        .route("/api/admin/documents/{id}", patch(admin::set_status))
        .route("/api/admin/documents/{id}/approve", post(admin::approve))
        .route("/api/admin/documents/{id}/reject", post(admin::reject))
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/users", get(admin::list_users))
        .route("/healthz", get(healthz))
}

/// Full application router with CORS, request tracing, body limits, and
/// `/media` file serving.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.media.max_upload_bytes.saturating_add(BODY_OVERHEAD_BYTES);
    let media_dir = ServeDir::new(&state.config.media.root);

    api_routes()
        .nest_service("/media", media_dir)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
