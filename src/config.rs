//! Service configuration parsed from environment variables.
//!
//! `main` loads `.env` (if present) via `dotenvy` before calling
//! [`AppConfig::from_env`]. Every optional key has a default; only
//! `DATABASE_URL` is required.

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_MEDIA_ROOT: &str = "./media";
pub const DEFAULT_MEDIA_BASE_URL: &str = "/media";
pub const DEFAULT_TESSERACT_CMD: &str = "tesseract";
pub const DEFAULT_PDFTOTEXT_CMD: &str = "pdftotext";
pub const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 168;

pub const DEFAULT_PER_CLIENT_LIMIT: usize = 10;
pub const DEFAULT_PER_CLIENT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_GLOBAL_LIMIT: usize = 30;
pub const DEFAULT_GLOBAL_WINDOW_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl crate::error::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "E_CONFIG_MISSING",
            Self::Invalid { .. } => "E_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaBackend {
    Local,
    Cloudinary { cloud_name: String, upload_preset: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub base_url: String,
    pub backend: MediaBackend,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractConfig {
    pub tesseract_cmd: String,
    pub pdftotext_cmd: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_client_limit: usize,
    pub per_client_window_secs: u64,
    pub global_limit: usize,
    pub global_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_client_limit: DEFAULT_PER_CLIENT_LIMIT,
            per_client_window_secs: DEFAULT_PER_CLIENT_WINDOW_SECS,
            global_limit: DEFAULT_GLOBAL_LIMIT,
            global_window_secs: DEFAULT_GLOBAL_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    /// Normalized (lowercase) emails that receive the admin role on signup.
    pub admin_emails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub media: MediaConfig,
    pub extract: ExtractConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`
    ///
    /// Optional:
    /// - `PORT` (3000), `DB_MAX_CONNECTIONS` (5)
    /// - `MEDIA_ROOT` (`./media`), `MEDIA_BASE_URL` (`/media`), `MAX_UPLOAD_BYTES`
    /// - `MEDIA_BACKEND`: `local` (default) or `cloudinary`; the latter needs
    ///   `CLOUDINARY_CLOUD_NAME` and `CLOUDINARY_UPLOAD_PRESET`
    /// - `TESSERACT_CMD`, `PDFTOTEXT_CMD`, `EXTRACT_TIMEOUT_SECS`
    /// - `SESSION_TTL_HOURS` (168), `COOKIE_SECURE`, `ADMIN_EMAILS`
    /// - `RATE_LIMIT_PER_CLIENT`, `RATE_LIMIT_PER_CLIENT_WINDOW_SECS`,
    ///   `RATE_LIMIT_GLOBAL`, `RATE_LIMIT_GLOBAL_WINDOW_SECS`
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a present value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let backend = parse_media_backend(
            std::env::var("MEDIA_BACKEND").ok().as_deref(),
            std::env::var("CLOUDINARY_CLOUD_NAME").ok(),
            std::env::var("CLOUDINARY_UPLOAD_PRESET").ok(),
        )?;

        let media = MediaConfig {
            root: std::env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_MEDIA_ROOT)),
            base_url: std::env::var("MEDIA_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_MEDIA_BASE_URL.to_owned())
                .trim_end_matches('/')
                .to_owned(),
            backend,
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        };

        let extract = ExtractConfig {
            tesseract_cmd: std::env::var("TESSERACT_CMD").unwrap_or_else(|_| DEFAULT_TESSERACT_CMD.to_owned()),
            pdftotext_cmd: std::env::var("PDFTOTEXT_CMD").unwrap_or_else(|_| DEFAULT_PDFTOTEXT_CMD.to_owned()),
            timeout_secs: env_parse("EXTRACT_TIMEOUT_SECS", DEFAULT_EXTRACT_TIMEOUT_SECS)?,
        };

        let rate_limit = RateLimitConfig {
            per_client_limit: env_parse("RATE_LIMIT_PER_CLIENT", DEFAULT_PER_CLIENT_LIMIT)?,
            per_client_window_secs: env_parse("RATE_LIMIT_PER_CLIENT_WINDOW_SECS", DEFAULT_PER_CLIENT_WINDOW_SECS)?,
            global_limit: env_parse("RATE_LIMIT_GLOBAL", DEFAULT_GLOBAL_LIMIT)?,
            global_window_secs: env_parse("RATE_LIMIT_GLOBAL_WINDOW_SECS", DEFAULT_GLOBAL_WINDOW_SECS)?,
        };

        let auth = AuthConfig {
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?,
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
            admin_emails: parse_admin_emails(std::env::var("ADMIN_EMAILS").ok().as_deref()),
        };

        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT)?,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            media,
            extract,
            rate_limit,
            auth,
        })
    }
}

/// Parse an optional env var, falling back to `default` when unset.
/// A set-but-unparseable value is an error rather than a silent default.
fn env_parse<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|raw| parse_bool(&raw))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_media_backend(
    raw: Option<&str>,
    cloud_name: Option<String>,
    upload_preset: Option<String>,
) -> Result<MediaBackend, ConfigError> {
    match raw.map(str::trim).unwrap_or("local").to_ascii_lowercase().as_str() {
        "local" => Ok(MediaBackend::Local),
        "cloudinary" => {
            let cloud_name = cloud_name
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing("CLOUDINARY_CLOUD_NAME"))?;
            let upload_preset = upload_preset
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing("CLOUDINARY_UPLOAD_PRESET"))?;
            Ok(MediaBackend::Cloudinary { cloud_name, upload_preset })
        }
        other => Err(ConfigError::Invalid { key: "MEDIA_BACKEND", value: other.to_owned() }),
    }
}

fn parse_admin_emails(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|e| e.trim().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
