//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, typed config, the rate limiter, and the two
//! pluggable backends (text extraction and media storage) as trait objects
//! so tests can swap in fakes without touching handlers.

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::rate_limit::RateLimiter;
use crate::services::extract::TextExtractor;
use crate::services::media::MediaStore;

/// Shared application state. Clone is required by Axum; every field is
/// Arc-wrapped or cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub extractor: Arc<dyn TextExtractor>,
    pub media: Arc<dyn MediaStore>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        extractor: Arc<dyn TextExtractor>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit);
        Self { pool, config: Arc::new(config), extractor, media, rate_limiter }
    }

    /// Directory for short-lived copies of uploads checked without saving.
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.config.media.root.join("tmp")
    }
}
