use crate::catalog::CatalogOptions;
use crate::http::HttpOptions;
use crate::thumbnails::{ThumbnailOptions, MAX_WORKERS};
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub catalog: CatalogOptions,
    pub thumbnails: ThumbnailOptions,
    pub http: HttpOptions,
}

impl HarvestConfig {
    /// Pulls out-of-range values back to the nearest supported one.
    pub fn clamped(mut self) -> Self {
        self.thumbnails.workers = self.thumbnails.workers.clamp(1, MAX_WORKERS);
        self.thumbnails.quality = self.thumbnails.quality.clamp(1, 100);
        self.thumbnails.max_edge = self.thumbnails.max_edge.clamp(16, 4096);
        self.http.retry.max_attempts = self.http.retry.max_attempts.clamp(1, 10);
        self.http.timeout_ms = self.http.timeout_ms.max(1_000);
        self.catalog.max_api_pages = self.catalog.max_api_pages.max(1);
        self.catalog.default_page_size = self.catalog.default_page_size.max(1);
        if !self.catalog.catalog_url_template.contains("{auction_id}") {
            self.catalog.catalog_url_template = CatalogOptions::default().catalog_url_template;
        }
        self
    }
}

/// Defaults when `path` is absent or missing on disk.
pub fn load_config(path: Option<&Path>) -> Result<HarvestConfig> {
    let Some(path) = path else {
        return Ok(HarvestConfig::default());
    };
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config_missing_using_defaults");
        return Ok(HarvestConfig::default());
    }
    let bytes = std::fs::read(path)?;
    let parsed: HarvestConfig = serde_json::from_slice(&bytes).map_err(|e| {
        EngineError::Configuration(format!(
            "failed to parse config at {}: {e}",
            path.to_string_lossy()
        ))
    })?;
    Ok(parsed.clamped())
}

pub fn save_config(path: &Path, config: &HarvestConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}
