//! Document service — submission, automatic checks, and review workflow.
//!
//! DESIGN
//! ======
//! A submission stores the uploaded file, extracts its text, checks the
//! submitted fields against it, and records the outcome. Fully matched
//! documents are `verified` immediately; anything else waits as `pending`
//! for an owner re-check or an admin decision.
//!
//! Status changes go through [`DocumentStatus::can_transition_to`] and are
//! written with a compare-and-set on the previous status, so two reviewers
//! acting at once cannot both win.
//!
//! ERROR HANDLING
//! ==============
//! Extraction failures during a submission do not reject the upload: the
//! file is kept, every check is recorded as a mismatch, and the document
//! lands in review. The stateless check endpoints surface the failure.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ErrorCode as _;
use crate::services::extract::{ExtractError, TextExtractor};
use crate::services::media::{MediaError, MediaStore, sanitize_file_name};
use crate::services::session::SessionUser;
use crate::verification::{self, DocumentKind, FieldErrors, SubmittedFields, VerificationReport};

pub const DEFAULT_REJECTION_REASON: &str = "Manual rejection by admin";
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_REASON_LEN: usize = 500;

// =============================================================================
// STATUS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Verified,
    ManualVerification,
    Rejected,
}

impl DocumentStatus {
    pub const ALL: [Self; 4] = [Self::Pending, Self::Verified, Self::ManualVerification, Self::Rejected];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::ManualVerification => "manual_verification",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|status| status.as_str().eq_ignore_ascii_case(raw))
    }

    /// Verified and rejected documents are final.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Rejected)
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match self {
            Self::Pending => next != Self::Pending,
            _ => next.is_terminal(),
        }
    }

    /// Status assigned from an automatic check on first submission.
    #[must_use]
    pub fn after_submission(report: &VerificationReport) -> Self {
        if report.is_verified() { Self::Verified } else { Self::Pending }
    }

    /// Status assigned from a re-check of a pending document.
    #[must_use]
    pub fn after_recheck(report: &VerificationReport) -> Self {
        if report.is_verified() { Self::Verified } else { Self::ManualVerification }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document not found: {0}")]
    NotFound(Uuid),
    #[error("not allowed to access document {0}")]
    Forbidden(Uuid),
    #[error("{0}")]
    InvalidFields(FieldErrors),
    #[error("missing document file")]
    MissingFile,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("cannot move document from {from} to {to}")]
    InvalidTransition { from: DocumentStatus, to: DocumentStatus },
    #[error("document {id} is {status}, only pending documents can be re-checked")]
    NotPending { id: Uuid, status: DocumentStatus },
    #[error("document {0} was modified concurrently")]
    Conflict(Uuid),
    #[error("text extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("media storage failed: {0}")]
    Media(#[from] MediaError),
    #[error("scratch file io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::error::ErrorCode for DocumentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_DOCUMENT_NOT_FOUND",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::InvalidFields(_) => "E_INVALID_FIELDS",
            Self::MissingFile => "E_MISSING_FILE",
            Self::InvalidInput(_) => "E_INVALID_INPUT",
            Self::InvalidTransition { .. } => "E_INVALID_TRANSITION",
            Self::NotPending { .. } => "E_NOT_PENDING",
            Self::Conflict(_) => "E_CONFLICT",
            Self::Extract(e) => e.error_code(),
            Self::Media(e) => e.error_code(),
            Self::Io(_) => "E_IO",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: DocumentKind,
    pub name: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub file_sha256: String,
    pub file_url: String,
    pub media_public_id: String,
    #[serde(skip)]
    pub storage_path: PathBuf,
    pub fields: serde_json::Value,
    /// Last check report; `None` until one has been recorded.
    pub verification: Option<VerificationReport>,
    pub status: DocumentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub verified_at: Option<OffsetDateTime>,
    pub reviewed_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
    pub rejection_reason: Option<String>,
}

impl DocumentRecord {
    /// Owners see their own documents; admins see everything.
    #[must_use]
    pub fn visible_to(&self, user: &SessionUser) -> bool {
        user.is_admin() || self.user_id == user.id
    }

    /// Rebuild validated fields from the stored JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidFields`] if the stored fields no
    /// longer satisfy the kind's requirements.
    pub fn submitted_fields(&self) -> Result<SubmittedFields, DocumentError> {
        let raw = json_to_field_map(&self.fields);
        verification::validate_fields(self.kind, &raw).map_err(DocumentError::InvalidFields)
    }
}

/// Result of a submission: the stored record and the check report.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub document: DocumentRecord,
    pub verification: VerificationReport,
}

/// Document counts per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub total: i64,
    pub pending: i64,
    pub manual_verification: i64,
    pub verified: i64,
    pub rejected: i64,
    /// Documents verified since midnight (database time zone).
    pub verified_today: i64,
}

/// Metadata supplied alongside the upload.
#[derive(Debug, Clone, Default)]
pub struct SubmissionMeta {
    pub name: Option<String>,
    pub description: Option<String>,
}

// =============================================================================
// HELPERS
// =============================================================================

#[must_use]
pub fn json_to_field_map(value: &serde_json::Value) -> BTreeMap<String, String> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
                .collect()
        })
        .unwrap_or_default()
}

fn clean_optional(text: Option<String>, max_len: usize, what: &str) -> Result<Option<String>, DocumentError> {
    let Some(text) = text.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > max_len {
        return Err(DocumentError::InvalidInput(format!("{what} longer than {max_len} characters")));
    }
    Ok(Some(text))
}

/// Reason stored on rejection; blank or missing falls back to the default.
///
/// # Errors
///
/// Returns [`DocumentError::InvalidInput`] if the reason is too long.
pub fn rejection_reason(reason: Option<String>) -> Result<String, DocumentError> {
    Ok(clean_optional(reason, MAX_REASON_LEN, "reason")?.unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_owned()))
}

/// Extract text and check `fields`, treating extraction failure as empty text.
async fn check_lenient(extractor: &dyn TextExtractor, fields: &SubmittedFields, path: &Path) -> VerificationReport {
    let text = match extractor.extract(path).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "extraction failed, recording as unmatched");
            String::new()
        }
    };
    verification::verify(fields, &text)
}

/// Check an upload without keeping it: write a scratch copy, extract, verify,
/// then remove the copy.
///
/// # Errors
///
/// Returns [`DocumentError::MissingFile`] for an empty upload, an I/O error
/// for the scratch file, or the extraction error.
pub async fn check_upload(
    extractor: &dyn TextExtractor,
    scratch_dir: &Path,
    fields: &SubmittedFields,
    upload: &Upload,
) -> Result<VerificationReport, DocumentError> {
    if upload.bytes.is_empty() {
        return Err(DocumentError::MissingFile);
    }
    tokio::fs::create_dir_all(scratch_dir).await?;
    let path = scratch_dir.join(format!("{}-{}", Uuid::new_v4().simple(), sanitize_file_name(&upload.file_name)));
    tokio::fs::write(&path, &upload.bytes).await?;

    let extracted = extractor.extract(&path).await;
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!(error = %e, path = %path.display(), "failed to remove scratch file");
    }

    let report = verification::verify(fields, &extracted?);
    tracing::info!(kind = %fields.kind(), verified = report.is_verified(), "stateless check complete");
    Ok(report)
}

// =============================================================================
// PERSISTENCE
// =============================================================================

const DOCUMENT_COLUMNS: &str = "id, user_id, kind, name, description, file_name, file_size, file_sha256, file_url, \
     media_public_id, storage_path, fields, verification, status, uploaded_at, verified_at, reviewed_by, \
     reviewed_at, rejection_reason";

/// [`DOCUMENT_COLUMNS`] qualified with the `d` alias for joins.
fn qualified_document_columns() -> String {
    DOCUMENT_COLUMNS
        .split(',')
        .map(|column| format!("d.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn document_from_row(row: &PgRow) -> Result<DocumentRecord, DocumentError> {
    let id: Uuid = row.get("id");
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let storage_path: String = row.get("storage_path");
    let kind = DocumentKind::parse(&kind).ok_or_else(|| DocumentError::InvalidInput(format!("stored kind {kind:?}")))?;
    let verification: serde_json::Value = row.get("verification");
    Ok(DocumentRecord {
        id,
        user_id: row.get("user_id"),
        kind,
        name: row.get("name"),
        description: row.get("description"),
        file_name: row.get("file_name"),
        file_size: row.get("file_size"),
        file_sha256: row.get("file_sha256"),
        file_url: row.get("file_url"),
        media_public_id: row.get("media_public_id"),
        storage_path: PathBuf::from(storage_path),
        fields: row.get("fields"),
        verification: VerificationReport::from_stored(kind, &verification),
        status: DocumentStatus::parse(&status)
            .ok_or_else(|| DocumentError::InvalidInput(format!("stored status {status:?}")))?,
        uploaded_at: row.get("uploaded_at"),
        verified_at: row.get("verified_at"),
        reviewed_by: row.get("reviewed_by"),
        reviewed_at: row.get("reviewed_at"),
        rejection_reason: row.get("rejection_reason"),
    })
}

/// Store, check, and record a new document for `owner_id`.
///
/// # Errors
///
/// Returns [`DocumentError::MissingFile`] for an empty upload, a media or
/// database error, or [`DocumentError::InvalidInput`] for bad metadata.
pub async fn submit(
    pool: &PgPool,
    media: &dyn MediaStore,
    extractor: &dyn TextExtractor,
    owner_id: Uuid,
    fields: &SubmittedFields,
    upload: Upload,
    meta: SubmissionMeta,
) -> Result<Submission, DocumentError> {
    if upload.bytes.is_empty() {
        return Err(DocumentError::MissingFile);
    }
    let kind = fields.kind();
    let name = clean_optional(meta.name, 200, "name")?.unwrap_or_else(|| kind.display_name().to_owned());
    let description = clean_optional(meta.description, MAX_DESCRIPTION_LEN, "description")?;

    let stored = media.store(kind, &upload.file_name, &upload.bytes).await?;
    let report = check_lenient(extractor, fields, &stored.local_path).await;
    let status = DocumentStatus::after_submission(&report);

    let inserted = sqlx::query(&format!(
        "INSERT INTO documents (
             id, user_id, kind, name, description, file_name, file_size, file_sha256, file_url,
             media_public_id, storage_path, fields, verification, status, verified_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                 CASE WHEN $14 = 'verified' THEN now() END)
         RETURNING {DOCUMENT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(kind.as_str())
    .bind(&name)
    .bind(&description)
    .bind(&upload.file_name)
    .bind(i64::try_from(stored.size).unwrap_or(i64::MAX))
    .bind(&stored.sha256)
    .bind(&stored.url)
    .bind(&stored.public_id)
    .bind(stored.local_path.to_string_lossy().as_ref())
    .bind(fields.to_json())
    .bind(report.to_stored())
    .bind(status.as_str())
    .fetch_one(pool)
    .await;

    let row = match inserted {
        Ok(row) => row,
        Err(e) => {
            if let Err(discard_err) = media.discard(&stored).await {
                tracing::warn!(error = %discard_err, public_id = %stored.public_id, "failed to discard upload");
            }
            return Err(e.into());
        }
    };

    let document = document_from_row(&row)?;
    tracing::info!(
        document_id = %document.id,
        %owner_id,
        %kind,
        %status,
        mismatched = ?report.mismatched_fields(),
        "document submitted"
    );
    Ok(Submission { document, verification: report })
}

/// Fetch one document the caller may see.
///
/// # Errors
///
/// Returns [`DocumentError::NotFound`], [`DocumentError::Forbidden`], or a
/// database error.
pub async fn get_for(pool: &PgPool, viewer: &SessionUser, document_id: Uuid) -> Result<DocumentRecord, DocumentError> {
    let document = get(pool, document_id).await?;
    if !document.visible_to(viewer) {
        return Err(DocumentError::Forbidden(document_id));
    }
    Ok(document)
}

async fn get(pool: &PgPool, document_id: Uuid) -> Result<DocumentRecord, DocumentError> {
    let row = sqlx::query(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"))
        .bind(document_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DocumentError::NotFound(document_id))?;
    document_from_row(&row)
}

/// Documents owned by `user_id`, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<DocumentRecord>, DocumentError> {
    let rows = sqlx::query(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = $1 ORDER BY uploaded_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(document_from_row).collect()
}

/// Documents in `status` (or all documents), oldest first so the review
/// queue is worked in arrival order. `search` matches the document name or
/// the owner's name or email, case-insensitively.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_by_status(
    pool: &PgPool,
    status: Option<DocumentStatus>,
    search: Option<&str>,
) -> Result<Vec<DocumentRecord>, DocumentError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM documents d JOIN users u ON u.id = d.user_id
         WHERE ($1::text IS NULL OR d.status = $1)
           AND ($2::text IS NULL OR d.name ILIKE $2 OR u.name ILIKE $2 OR u.email ILIKE $2)
         ORDER BY d.uploaded_at ASC",
        qualified_document_columns()
    ))
    .bind(status.map(DocumentStatus::as_str))
    .bind(search.and_then(crate::db::like_pattern))
    .fetch_all(pool)
    .await?;
    rows.iter().map(document_from_row).collect()
}

/// Document counts per status, plus today's verifications.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn stats(pool: &PgPool) -> Result<DocumentStats, DocumentError> {
    let (total, pending, manual_verification, verified, rejected, verified_today) =
        sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'pending'),
                    COUNT(*) FILTER (WHERE status = 'manual_verification'),
                    COUNT(*) FILTER (WHERE status = 'verified'),
                    COUNT(*) FILTER (WHERE status = 'rejected'),
                    COUNT(*) FILTER (WHERE status = 'verified' AND verified_at >= date_trunc('day', now()))
             FROM documents",
        )
        .fetch_one(pool)
        .await?;
    Ok(DocumentStats { total, pending, manual_verification, verified, rejected, verified_today })
}

/// Compare-and-set a status change. `reviewer` is recorded for admin actions.
async fn transition(
    pool: &PgPool,
    document: &DocumentRecord,
    to: DocumentStatus,
    reviewer: Option<Uuid>,
    reason: Option<&str>,
    verification: Option<&VerificationReport>,
) -> Result<DocumentRecord, DocumentError> {
    let from = document.status;
    if !from.can_transition_to(to) {
        return Err(DocumentError::InvalidTransition { from, to });
    }

    let row = sqlx::query(&format!(
        "UPDATE documents SET
             status = $3,
             verified_at = CASE WHEN $3 = 'verified' THEN now() ELSE NULL END,
             rejection_reason = CASE WHEN $3 = 'rejected' THEN $5 ELSE NULL END,
             reviewed_by = COALESCE($4, reviewed_by),
             reviewed_at = CASE WHEN $4 IS NULL THEN reviewed_at ELSE now() END,
             verification = COALESCE($6, verification)
         WHERE id = $1 AND status = $2
         RETURNING {DOCUMENT_COLUMNS}"
    ))
    .bind(document.id)
    .bind(from.as_str())
    .bind(to.as_str())
    .bind(reviewer)
    .bind(reason)
    .bind(verification.map(VerificationReport::to_stored))
    .fetch_optional(pool)
    .await?
    .ok_or(DocumentError::Conflict(document.id))?;

    let updated = document_from_row(&row)?;
    tracing::info!(document_id = %updated.id, %from, %to, reviewer = ?reviewer, "document status changed");
    Ok(updated)
}

/// Re-run extraction and checks on a pending document.
/// A full match verifies it; otherwise it moves to manual verification.
///
/// # Errors
///
/// Returns access errors, [`DocumentError::NotPending`] if the document is
/// not pending, or a database error.
pub async fn reverify(
    pool: &PgPool,
    extractor: &dyn TextExtractor,
    actor: &SessionUser,
    document_id: Uuid,
) -> Result<(DocumentRecord, VerificationReport), DocumentError> {
    let document = get_for(pool, actor, document_id).await?;
    if document.status != DocumentStatus::Pending {
        return Err(DocumentError::NotPending { id: document.id, status: document.status });
    }

    let fields = document.submitted_fields()?;
    let report = check_lenient(extractor, &fields, &document.storage_path).await;
    let next = DocumentStatus::after_recheck(&report);
    let updated = transition(pool, &document, next, None, None, Some(&report)).await?;
    Ok((updated, report))
}

/// Admin approval.
///
/// # Errors
///
/// Returns [`DocumentError::NotFound`], an invalid transition, a conflict,
/// or a database error.
pub async fn approve(pool: &PgPool, admin: &SessionUser, document_id: Uuid) -> Result<DocumentRecord, DocumentError> {
    set_status(pool, admin, document_id, DocumentStatus::Verified, None).await
}

/// Admin rejection with an optional reason.
///
/// # Errors
///
/// Same as [`approve`], plus [`DocumentError::InvalidInput`] for an
/// over-long reason.
pub async fn reject(
    pool: &PgPool,
    admin: &SessionUser,
    document_id: Uuid,
    reason: Option<String>,
) -> Result<DocumentRecord, DocumentError> {
    set_status(pool, admin, document_id, DocumentStatus::Rejected, reason).await
}

/// Admin status change to any allowed target.
///
/// # Errors
///
/// Same as [`reject`], plus [`DocumentError::Forbidden`] for non-admins.
pub async fn set_status(
    pool: &PgPool,
    admin: &SessionUser,
    document_id: Uuid,
    to: DocumentStatus,
    reason: Option<String>,
) -> Result<DocumentRecord, DocumentError> {
    if !admin.is_admin() {
        return Err(DocumentError::Forbidden(document_id));
    }
    let reason = if to == DocumentStatus::Rejected { Some(rejection_reason(reason)?) } else { None };
    let document = get(pool, document_id).await?;
    transition(pool, &document, to, Some(admin.id), reason.as_deref(), None).await
}

#[cfg(test)]
#[path = "document_test.rs"]
mod tests;
