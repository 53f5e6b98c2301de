//! Reconciles the history against the image directory
//!
//! The scan is a single flat `read_dir` of the base path. Subdirectories are
//! never entered, and only one format is recognised: the lock screen only
//! accepts PNGs.

use std::fs;
use std::path::Path;

use crate::core::{CandidatePool, HistoryDocument};
use crate::history::HistoryError;

/// Extensions (lowercase, without dot) eligible for selection
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png"];

/// Checks if a file has a supported image extension (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// True if `key` names an existing file under `base_path`.
pub fn image_exists(base_path: &Path, key: &str) -> bool {
    base_path.join(key).is_file()
}

/// Splits the document's images into known and missing, and discovers new
/// files in `base_path`.
///
/// Missing images are only reported and logged; the document is not
/// changed, so their history survives until the file comes back.
///
/// # Errors
///
/// Returns `HistoryError::BaseDirUnreadable` if `base_path` cannot be listed.
pub fn reconcile(document: &HistoryDocument, base_path: &Path) -> Result<CandidatePool, HistoryError> {
    let mut pool = CandidatePool::default();

    for key in document.images.keys() {
        if image_exists(base_path, key) {
            pool.known.insert(key.clone());
        } else {
            tracing::warn!("Cannot include history image key '{}': FileNotFound", key);
            pool.missing.push(key.clone());
        }
    }

    let entries = fs::read_dir(base_path).map_err(|source| HistoryError::BaseDirUnreadable {
        path: base_path.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in {}: {}", base_path.display(), e);
                continue;
            }
        };
        let path = entry.path();

        if !path.is_file() {
            tracing::debug!("Not including '{}': not a regular file", path.display());
            continue;
        }
        if !is_supported_image(&path) {
            tracing::debug!(
                "Not including file '{}': file type not supported",
                path.display()
            );
            continue;
        }

        let Some(key) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!("Not including '{}': name is not valid UTF-8", path.display());
            continue;
        };

        if !document.images.contains_key(&key) {
            tracing::debug!("Discovered NEW image '{}'", key);
            pool.discovered.insert(key);
        }
    }

    Ok(pool)
}
