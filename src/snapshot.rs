use crate::listing::Listing;
use crate::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which strategy produced a snapshot's items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    Api,
    Dom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub auction_id: String,
    pub scraped_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auction_label: Option<String>,
    /// Absent in snapshots written by older tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExtractionMode>,
    #[serde(default)]
    pub items: Vec<Listing>,
}

pub fn save_snapshot(path: &Path, snapshot: &CatalogSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, format!("{json}\n"))?;
    tracing::info!(
        auction_id = %snapshot.auction_id,
        items = snapshot.items.len(),
        path = %path.display(),
        "snapshot_saved"
    );
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<CatalogSnapshot> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        EngineError::Configuration(format!(
            "failed to parse catalog snapshot at {}: {e}",
            path.to_string_lossy()
        ))
    })
}
