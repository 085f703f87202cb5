//! Multipart form reading shared by the upload endpoints.

use std::collections::BTreeMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;

use crate::error::ApiError;
use crate::services::document::Upload;

/// Multipart part carrying the document file.
pub const FILE_FIELD: &str = "document_file";
const DEFAULT_UPLOAD_NAME: &str = "upload";

/// Text fields plus the optional uploaded file.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: BTreeMap<String, String>,
    pub file: Option<Upload>,
}

impl UploadForm {
    /// Remove a non-blank text field, trimming it.
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.fields
            .remove(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }
}

fn multipart_error(err: &MultipartError) -> ApiError {
    ApiError::new(err.status(), "E_MULTIPART", err.body_text())
}

/// Read every part. Later duplicates of a text field win; a second file
/// part replaces the first.
///
/// # Errors
///
/// Returns the multipart rejection (400, or 413 over the body limit).
pub async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        let name = field.name().unwrap_or_default().to_owned();
        if name == FILE_FIELD {
            let file_name = field
                .file_name()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(DEFAULT_UPLOAD_NAME)
                .to_owned();
            let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
            form.file = Some(Upload { file_name, bytes: bytes.to_vec() });
        } else if !name.is_empty() {
            let value = field.text().await.map_err(|e| multipart_error(&e))?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}
