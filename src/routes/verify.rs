//! Stateless check endpoints: `POST /api/ssc/`, `/api/cet/`, `/api/domicile/`.
//!
//! Nothing is persisted. A valid request returns the flat report object; an
//! invalid one returns 400 with the bare field-error map, e.g.
//! `{"roll_no": ["This field is required."], "name": ["This field may not be blank."]}`.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::error::ApiError;
use crate::rate_limit::ANONYMOUS_CLIENT;
use crate::routes::auth::MaybeUser;
use crate::routes::documents::document_error;
use crate::routes::enforce_rate_limit;
use crate::routes::form::{FILE_FIELD, read_upload_form};
use crate::services::document;
use crate::state::AppState;
use crate::verification::{self, DocumentKind, FieldErrors};

pub const MISSING_FILE_MESSAGE: &str = "No file was submitted.";
pub const EMPTY_FILE_MESSAGE: &str = "The submitted file is empty.";

async fn check(state: AppState, caller: MaybeUser, multipart: Multipart, kind: DocumentKind) -> Result<Response, ApiError> {
    let form = read_upload_form(multipart).await?;

    let (fields, mut errors) = match verification::validate_fields(kind, &form.fields) {
        Ok(fields) => (Some(fields), FieldErrors::default()),
        Err(errors) => (None, errors),
    };
    let file = match form.file {
        None => {
            errors.add(FILE_FIELD, MISSING_FILE_MESSAGE);
            None
        }
        Some(file) if file.bytes.is_empty() => {
            errors.add(FILE_FIELD, EMPTY_FILE_MESSAGE);
            None
        }
        Some(file) => Some(file),
    };
    let (Some(fields), Some(file)) = (fields, file) else {
        return Ok((StatusCode::BAD_REQUEST, Json(errors)).into_response());
    };

    let client = caller.0.map_or(ANONYMOUS_CLIENT, |u| u.id);
    enforce_rate_limit(&state, client)?;

    let report = document::check_upload(state.extractor.as_ref(), &state.scratch_dir(), &fields, &file)
        .await
        .map_err(document_error)?;
    Ok(Json(report).into_response())
}

/// `POST /api/ssc/` — fields `name`, `roll_no`, `result`.
pub async fn verify_ssc(State(state): State<AppState>, caller: MaybeUser, multipart: Multipart) -> Result<Response, ApiError> {
    check(state, caller, multipart, DocumentKind::Ssc).await
}

/// `POST /api/cet/` — fields `name`, `roll_no`, `application_no`, `category`, `mothers_name`.
pub async fn verify_cet(State(state): State<AppState>, caller: MaybeUser, multipart: Multipart) -> Result<Response, ApiError> {
    check(state, caller, multipart, DocumentKind::Cet).await
}

/// `POST /api/domicile/` — fields `name`, `certificate_number`, `state`.
pub async fn verify_domicile(
    State(state): State<AppState>,
    caller: MaybeUser,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    check(state, caller, multipart, DocumentKind::Domicile).await
}

#[cfg(test)]
#[path = "verify_test.rs"]
mod tests;
