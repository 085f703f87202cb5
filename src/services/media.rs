//! Media storage for uploaded document files.
//!
//! ARCHITECTURE
//! ============
//! Every upload is written under `MEDIA_ROOT` first, because extraction
//! tools read from disk. The local store serves those files itself under
//! `MEDIA_BASE_URL`. The Cloudinary store additionally pushes the bytes to
//! Cloudinary (unsigned preset upload) and returns the hosted URL, keeping
//! the local copy for re-verification.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{MediaBackend, MediaConfig};
use crate::verification::DocumentKind;

const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";
const UPLOAD_TIMEOUT_SECS: u64 = 60;
const FOLDER_PREFIX: &str = "document_verification";

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("empty upload")]
    Empty,
    #[error("media io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("media host request failed: {0}")]
    Request(String),
    #[error("media host response error: status {status}")]
    Response { status: u16, body: String },
}

impl crate::error::ErrorCode for MediaError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "E_MEDIA_EMPTY",
            Self::Io(_) => "E_MEDIA_IO",
            Self::Request(_) => "E_MEDIA_REQUEST",
            Self::Response { .. } => "E_MEDIA_RESPONSE",
        }
    }
}

/// Where a stored upload lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    /// Public URL of the file.
    pub url: String,
    /// Storage identifier (`<kind>/<file>` locally, Cloudinary `public_id` otherwise).
    pub public_id: String,
    /// On-disk copy used for text extraction.
    pub local_path: PathBuf,
    pub size: u64,
    /// Hex SHA-256 of the file bytes.
    pub sha256: String,
    /// Cloudinary delete token, when the upload preset returns one.
    pub delete_token: Option<String>,
}

#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist `bytes` for a document of `kind`.
    ///
    /// # Errors
    ///
    /// Returns a [`MediaError`] if the upload is empty, the disk write
    /// fails, or the remote host rejects the upload.
    async fn store(&self, kind: DocumentKind, original_name: &str, bytes: &[u8]) -> Result<StoredMedia, MediaError>;

    /// Remove a stored upload that will not be recorded.
    ///
    /// # Errors
    ///
    /// Returns a [`MediaError`] if the local file or remote asset cannot be
    /// removed. A local file that is already gone is not an error.
    async fn discard(&self, stored: &StoredMedia) -> Result<(), MediaError>;
}

/// Build the configured store.
///
/// # Errors
///
/// Returns an error if the HTTP client for a remote backend cannot be built.
pub fn from_config(config: &MediaConfig) -> Result<std::sync::Arc<dyn MediaStore>, MediaError> {
    let local = LocalMediaStore::new(config.root.clone(), config.base_url.clone());
    match &config.backend {
        MediaBackend::Local => Ok(std::sync::Arc::new(local)),
        MediaBackend::Cloudinary { cloud_name, upload_preset } => Ok(std::sync::Arc::new(CloudinaryMediaStore::new(
            local,
            cloud_name.clone(),
            upload_preset.clone(),
        )?)),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Reduce an uploaded file name to a safe single path component.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() { "upload".to_owned() } else { cleaned.to_owned() }
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    crate::services::session::bytes_to_hex(&digest)
}

// =============================================================================
// LOCAL STORE
// =============================================================================

pub struct LocalMediaStore {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStore {
    #[must_use]
    pub fn new(root: PathBuf, base_url: String) -> Self {
        Self { root, base_url: base_url.trim_end_matches('/').to_owned() }
    }

    fn url_for(&self, public_id: &str) -> String {
        format!("{}/{public_id}", self.base_url)
    }
}

#[async_trait::async_trait]
impl MediaStore for LocalMediaStore {
    async fn store(&self, kind: DocumentKind, original_name: &str, bytes: &[u8]) -> Result<StoredMedia, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }

        let file_name = format!("{}-{}", Uuid::new_v4().simple(), sanitize_file_name(original_name));
        let dir = self.root.join(kind.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        let local_path = dir.join(&file_name);
        tokio::fs::write(&local_path, bytes).await?;

        let public_id = format!("{}/{file_name}", kind.as_str());
        tracing::info!(%kind, path = %local_path.display(), size = bytes.len(), "upload stored");

        Ok(StoredMedia {
            url: self.url_for(&public_id),
            public_id,
            local_path,
            size: bytes.len() as u64,
            sha256: sha256_hex(bytes),
            delete_token: None,
        })
    }

    async fn discard(&self, stored: &StoredMedia) -> Result<(), MediaError> {
        match tokio::fs::remove_file(&stored.local_path).await {
            Ok(()) => {
                tracing::info!(path = %stored.local_path.display(), "upload discarded");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// CLOUDINARY STORE
// =============================================================================

pub struct CloudinaryMediaStore {
    local: LocalMediaStore,
    http: reqwest::Client,
    api_base: String,
    cloud_name: String,
    upload_preset: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    delete_token: Option<String>,
}

impl CloudinaryMediaStore {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(local: LocalMediaStore, cloud_name: String, upload_preset: String) -> Result<Self, MediaError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| MediaError::Request(e.to_string()))?;
        Ok(Self { local, http, api_base: CLOUDINARY_API_BASE.to_owned(), cloud_name, upload_preset })
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: &str) -> Self {
        api_base.clone_into(&mut self.api_base);
        self
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/upload", self.api_base, self.cloud_name)
    }

    fn delete_url(&self) -> String {
        format!("{}/{}/delete_by_token", self.api_base, self.cloud_name)
    }

    async fn push(&self, kind: DocumentKind, original_name: &str, bytes: &[u8]) -> Result<UploadResponse, MediaError> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(sanitize_file_name(original_name));
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", folder_for(kind));

        let response = self
            .http
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))?;
        parse_upload_response(status, &body)
    }

    async fn delete_remote(&self, token: &str) -> Result<(), MediaError> {
        let form = reqwest::multipart::Form::new().text("token", token.to_owned());
        let response = self
            .http
            .post(self.delete_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(MediaError::Response { status: status.as_u16(), body })
    }
}

fn folder_for(kind: DocumentKind) -> String {
    format!("{FOLDER_PREFIX}/{}", kind.as_str())
}

fn parse_upload_response(status: u16, body: &str) -> Result<UploadResponse, MediaError> {
    if !(200..300).contains(&status) {
        return Err(MediaError::Response { status, body: body.to_owned() });
    }
    serde_json::from_str(body).map_err(|e| MediaError::Request(format!("invalid upload response: {e}")))
}

#[async_trait::async_trait]
impl MediaStore for CloudinaryMediaStore {
    async fn store(&self, kind: DocumentKind, original_name: &str, bytes: &[u8]) -> Result<StoredMedia, MediaError> {
        let local = self.local.store(kind, original_name, bytes).await?;

        let uploaded = match self.push(kind, original_name, bytes).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                if let Err(cleanup) = self.local.discard(&local).await {
                    tracing::warn!(error = %cleanup, path = %local.local_path.display(), "failed to remove local copy");
                }
                return Err(e);
            }
        };
        tracing::info!(%kind, public_id = %uploaded.public_id, "upload pushed to cloudinary");

        Ok(StoredMedia {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
            delete_token: uploaded.delete_token,
            ..local
        })
    }

    async fn discard(&self, stored: &StoredMedia) -> Result<(), MediaError> {
        self.local.discard(stored).await?;
        match &stored.delete_token {
            Some(token) => self.delete_remote(token).await,
            None => {
                tracing::warn!(public_id = %stored.public_id, "no delete token, remote asset left in place");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "media_test.rs"]
mod tests;
