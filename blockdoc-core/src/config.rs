//! Editor configuration with environment overrides.

use std::time::Duration;

use crate::{DEFAULT_ACTIVE_ROW, MAX_IMAGE_BYTES};

/// Storage key the document is saved under.
pub const DEFAULT_STORAGE_KEY: &str = "editor_saved_data";

/// Default bound on leaf-data collection and surface readiness waits.
const DEFAULT_SYNC_TIMEOUT_MS: u64 = 500;

/// Tunables for a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// Fixed storage key for the saved document.
    pub storage_key: String,
    /// Largest accepted image source in bytes.
    pub max_image_bytes: usize,
    /// Row new blocks are packed into.
    pub active_row: u32,
    /// `(cols, rows)` of a new text block.
    pub text_block_size: (u32, u32),
    /// `(cols, rows)` of a new image block.
    pub image_block_size: (u32, u32),
    /// How long to wait for surfaces to answer or mount.
    pub sync_timeout: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_image_bytes: MAX_IMAGE_BYTES,
            active_row: DEFAULT_ACTIVE_ROW,
            text_block_size: (1, 1),
            image_block_size: (2, 2),
            sync_timeout: Duration::from_millis(DEFAULT_SYNC_TIMEOUT_MS),
        }
    }
}

impl EditorConfig {
    /// Create a configuration from environment variables or defaults.
    ///
    /// Environment variables:
    /// - `BLOCKDOC_STORAGE_KEY`: storage key (default: `editor_saved_data`)
    /// - `BLOCKDOC_MAX_IMAGE_BYTES`: image ceiling (default: 5 MiB)
    /// - `BLOCKDOC_ACTIVE_ROW`: packing row (default: 0)
    /// - `BLOCKDOC_SYNC_TIMEOUT_MS`: surface wait bound (default: 500)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let storage_key = std::env::var("BLOCKDOC_STORAGE_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .unwrap_or(defaults.storage_key);
        let max_image_bytes = env_parse("BLOCKDOC_MAX_IMAGE_BYTES").unwrap_or(MAX_IMAGE_BYTES);
        let active_row = env_parse("BLOCKDOC_ACTIVE_ROW").unwrap_or(DEFAULT_ACTIVE_ROW);
        let sync_timeout = env_parse("BLOCKDOC_SYNC_TIMEOUT_MS")
            .map_or(defaults.sync_timeout, Duration::from_millis);
        Self {
            storage_key,
            max_image_bytes,
            active_row,
            sync_timeout,
            ..defaults
        }
    }

    /// Use a different storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Use a different surface wait bound.
    #[must_use]
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
