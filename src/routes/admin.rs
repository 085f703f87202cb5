//! Admin review routes.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::auth::{AdminUser, account_error};
use crate::routes::documents::document_error;
use crate::services::account::{self, UserWithCounts};
use crate::services::document::{self, DocumentRecord, DocumentStats, DocumentStatus};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct RejectBody {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct SetStatusBody {
    pub status: DocumentStatus,
    pub reason: Option<String>,
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<DocumentStatus>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
        None => Ok(None),
        Some(s) => DocumentStatus::parse(s)
            .map(Some)
            .ok_or_else(|| ApiError::bad_request(format!("unknown status: {s}"))),
    }
}

/// `GET /api/admin/documents?status=&q=` — review queue, oldest first.
pub async fn list_documents(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<DocumentRecord>>, ApiError> {
    let status = parse_status_filter(query.status.as_deref())?;
    let documents = document::list_by_status(&state.pool, status, query.q.as_deref())
        .await
        .map_err(document_error)?;
    Ok(Json(documents))
}

/// `GET /api/admin/stats`
pub async fn stats(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<DocumentStats>, ApiError> {
    let stats = document::stats(&state.pool).await.map_err(document_error)?;
    Ok(Json(stats))
}

/// `POST /api/admin/documents/{id}/approve`
pub async fn approve(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentRecord>, ApiError> {
    let doc = document::approve(&state.pool, &admin, id)
        .await
        .map_err(document_error)?;
    Ok(Json(doc))
}

/// `POST /api/admin/documents/{id}/reject` — body `{"reason": "..."}` is optional.
pub async fn reject(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    body: Option<Json<RejectBody>>,
) -> Result<Json<DocumentRecord>, ApiError> {
    let reason = body.and_then(|Json(b)| b.reason);
    let doc = document::reject(&state.pool, &admin, id, reason)
        .await
        .map_err(document_error)?;
    Ok(Json(doc))
}

/// `PATCH /api/admin/documents/{id}` — body `{"status": "...", "reason": "..."}`.
pub async fn set_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<SetStatusBody>,
) -> Result<Json<DocumentRecord>, ApiError> {
    let doc = document::set_status(&state.pool, &admin, id, body.status, body.reason)
        .await
        .map_err(document_error)?;
    Ok(Json(doc))
}

/// `GET /api/admin/users?q=` — `q` matches name or email.
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserWithCounts>>, ApiError> {
    let users = account::list_users_with_counts(&state.pool, query.q.as_deref())
        .await
        .map_err(account_error)?;
    Ok(Json(users))
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
