use std::path::{Path, PathBuf};

/// On-disk layout under one output root.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub root: PathBuf,
}

impl OutputPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("img")
    }

    pub fn auction_images_dir(&self, auction_id: &str) -> PathBuf {
        self.images_dir().join(sanitize_path_component(auction_id))
    }

    pub fn thumbnail_path(&self, auction_id: &str, lot_id: &str) -> PathBuf {
        self.auction_images_dir(auction_id)
            .join(format!("{}.webp", sanitize_path_component(lot_id)))
    }

    pub fn snapshot_path(&self, auction_id: &str) -> PathBuf {
        self.root
            .join(format!("auction_{}.json", sanitize_path_component(auction_id)))
    }
}

/// Replaces path separators and parent references so an id always names a
/// single file inside its directory.
pub fn sanitize_path_component(value: &str) -> String {
    let replaced: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match replaced.as_str() {
        "" => "_".to_string(),
        "." | ".." => replaced.replace('.', "_"),
        _ => replaced,
    }
}

/// True when `path` is a regular file with at least one byte.
pub fn is_cached_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
