//! Document submission and owner-facing document routes.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::auth::AuthUser;
use crate::routes::enforce_rate_limit;
use crate::routes::form::read_upload_form;
use crate::services::document::{self, DocumentError, DocumentRecord, SubmissionMeta};
use crate::services::extract::ExtractError;
use crate::services::media::MediaError;
use crate::verification::{self, DocumentKind, VerificationReport};
use crate::state::AppState;

pub(crate) fn document_error(err: DocumentError) -> ApiError {
    let status = match &err {
        DocumentError::NotFound(_) => StatusCode::NOT_FOUND,
        DocumentError::Forbidden(_) => StatusCode::FORBIDDEN,
        DocumentError::InvalidFields(_) | DocumentError::MissingFile | DocumentError::InvalidInput(_) => {
            StatusCode::BAD_REQUEST
        }
        DocumentError::InvalidTransition { .. } | DocumentError::NotPending { .. } | DocumentError::Conflict(_) => {
            StatusCode::CONFLICT
        }
        DocumentError::Extract(ExtractError::Failed { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        DocumentError::Extract(ExtractError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        DocumentError::Media(MediaError::Empty) => StatusCode::BAD_REQUEST,
        DocumentError::Media(MediaError::Request(_) | MediaError::Response { .. }) => StatusCode::BAD_GATEWAY,
        DocumentError::Extract(ExtractError::Spawn { .. })
        | DocumentError::Media(MediaError::Io(_))
        | DocumentError::Io(_)
        | DocumentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let details = match &err {
        DocumentError::InvalidFields(errors) => serde_json::to_value(errors).ok(),
        _ => None,
    };
    let api = ApiError::from_err(status, &err);
    match details {
        Some(details) => api.with_details(details),
        None => api,
    }
}

/// Parse a kind path segment; unknown kinds are 404.
pub(crate) fn parse_kind(raw: &str) -> Result<DocumentKind, ApiError> {
    DocumentKind::parse(raw)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "E_UNKNOWN_KIND", format!("unknown document kind: {raw}")))
}

#[derive(Serialize)]
pub struct RecheckResponse {
    pub document: DocumentRecord,
    pub verification: VerificationReport,
}

/// `POST /api/documents/{kind}` — upload a document and run the automatic check.
///
/// Multipart fields: the kind's required fields, `document_file`, and the
/// optional `document_name` and `description`.
pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let mut form = read_upload_form(multipart).await?;
    let meta = SubmissionMeta { name: form.take("document_name"), description: form.take("description") };
    let fields = verification::validate_fields(kind, &form.fields)
        .map_err(|e| document_error(DocumentError::InvalidFields(e)))?;
    let upload = form.file.ok_or_else(|| document_error(DocumentError::MissingFile))?;

    enforce_rate_limit(&state, auth.user.id)?;

    let submission = document::submit(
        &state.pool,
        state.media.as_ref(),
        state.extractor.as_ref(),
        auth.user.id,
        &fields,
        upload,
        meta,
    )
    .await
    .map_err(document_error)?;

    Ok((StatusCode::CREATED, Json(submission)))
}

/// `GET /api/documents` — caller's documents, newest first.
pub async fn list_mine(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<DocumentRecord>>, ApiError> {
    let documents = document::list_for_user(&state.pool, auth.user.id)
        .await
        .map_err(document_error)?;
    Ok(Json(documents))
}

/// `GET /api/documents/{id}` — shares its path pattern with the kind-keyed
/// submit route, so the id is parsed here.
pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(key): Path<String>,
) -> Result<Json<DocumentRecord>, ApiError> {
    let id = Uuid::parse_str(&key)
        .map_err(|_| ApiError::new(StatusCode::NOT_FOUND, "E_DOCUMENT_NOT_FOUND", format!("document not found: {key}")))?;
    let doc = document::get_for(&state.pool, &auth.user, id)
        .await
        .map_err(document_error)?;
    Ok(Json(doc))
}

/// `POST /api/documents/{id}/verify` — re-run the check on a pending document.
pub async fn reverify(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RecheckResponse>, ApiError> {
    enforce_rate_limit(&state, auth.user.id)?;
    let (document, verification) = document::reverify(&state.pool, state.extractor.as_ref(), &auth.user, id)
        .await
        .map_err(document_error)?;
    Ok(Json(RecheckResponse { document, verification }))
}

#[cfg(test)]
#[path = "documents_test.rs"]
mod tests;
