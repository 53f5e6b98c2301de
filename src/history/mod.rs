// Copyright 2025 Eric Jingryd (tidynest@proton.me)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! History file management with atomic writes and backup support.
//!
//! This module owns the only persisted state: the JSON history document.
//! Key features:
//!
//! - **Validation on load**: missing keys and bad timestamps are fatal
//! - **Atomic writes**: temp-file-then-rename, the file is never half-written
//! - **Backups on init**: re-initialising keeps a timestamped copy
//! - **Catalog scanning**: reconciling history keys with the image directory
//!
//! Each invocation does one load, compute, save cycle. There is no lock file:
//! two overlapping invocations both write a complete document and the last
//! one wins.
//!
//! # Example
//!
//! ```no_run
//! use sleep_background::history::HistoryStore;
//!
//! let store = HistoryStore::new("/home/user/.config/i3/sleep_history.json");
//! let mut document = store.load()?;
//! document.policy.frequency_weight_multiplier = 2.0;
//! store.save(&document)?;
//! # Ok::<(), sleep_background::history::HistoryError>(())
//! ```

pub mod catalog;
pub mod error;
pub mod validator;

pub use catalog::reconcile;
pub use error::HistoryError;

use atomic_write_file::AtomicWriteFile;
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::HistoryDocument;

/// Expands a leading `~` so paths stored in the document work for any user.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Loads and saves the history document at a fixed path.
#[derive(Debug)]
pub struct HistoryStore {
    /// Path to the history JSON file.
    path: PathBuf,
}

impl HistoryStore {
    /// Creates a store for `path`. Nothing is read until `load()`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the history document, creating a default one if none exists.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Read` if the file cannot be read, or any of the
    /// validation errors from [`validator::parse_document`].
    pub fn load(&self) -> Result<HistoryDocument, HistoryError> {
        if !self.path.exists() {
            tracing::info!(
                "No history / configuration at {}, initializing as blank",
                self.path.display()
            );
            let document = HistoryDocument::default();
            self.save(&document)?;
            return Ok(document);
        }

        tracing::info!("Loading history / configuration from {}", self.path.display());
        let content = fs::read_to_string(&self.path).map_err(|source| HistoryError::Read {
            path: self.path.clone(),
            source,
        })?;

        validator::parse_document(&content, &self.path)
    }

    /// Writes the document atomically.
    ///
    /// Timestamps are formatted during serialisation only, so `document`
    /// keeps its parsed values and can still be used afterwards.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::WriteFailed` if the temp file cannot be
    /// created, written or renamed into place. The previous file is left
    /// untouched in that case.
    pub fn save(&self, document: &HistoryDocument) -> Result<(), HistoryError> {
        let mut content = serde_json::to_string_pretty(document)
            .map_err(|e| HistoryError::WriteFailed(format!("Failed to serialise history: {}", e)))?;
        content.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = AtomicWriteFile::options()
            .open(&self.path)
            .map_err(|e| HistoryError::WriteFailed(format!("Failed to open for atomic write: {}", e)))?;

        file.write_all(content.as_bytes())
            .map_err(|e| HistoryError::WriteFailed(format!("Failed to write content: {}", e)))?;

        file.commit()
            .map_err(|e| HistoryError::WriteFailed(format!("Failed to commit atomic write: {}", e)))?;

        tracing::info!("Updated history {}", self.path.display());
        tracing::debug!("{:?}", document);
        Ok(())
    }

    /// Replaces any existing history with a blank default document.
    ///
    /// An existing file is first copied into `backups/` next to it.
    pub fn init(&self) -> Result<HistoryDocument, HistoryError> {
        if self.path.exists() {
            tracing::warn!("Overriding previous history at {}", self.path.display());
            let backup = self.create_timestamped_backup()?;
            tracing::info!("Previous history kept at {}", backup.display());
        }

        let document = HistoryDocument::default();
        tracing::info!("Initialize NEW history at {}", self.path.display());
        self.save(&document)?;
        Ok(document)
    }

    /// Copies the current file to `backups/<name>.<YYYY-MM-DD_HHMMSS>`.
    pub(crate) fn create_timestamped_backup(&self) -> Result<PathBuf, HistoryError> {
        let backup_dir = self
            .path
            .parent()
            .map(|parent| parent.join("backups"))
            .ok_or_else(|| HistoryError::BackupFailed("History file has no parent directory".to_string()))?;

        if !backup_dir.exists() {
            fs::create_dir_all(&backup_dir).map_err(|e| {
                HistoryError::BackupFailed(format!("{}: {}", backup_dir.display(), e))
            })?;
        }

        let original_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| HistoryError::BackupFailed("History path has no file name".to_string()))?;

        // Generate timestamp in YYYY-MM-DD_HHMMSS format
        let timestamp = Local::now().format("%Y-%m-%d_%H%M%S");
        let backup_path = backup_dir.join(format!("{}.{}", original_name, timestamp));

        fs::copy(&self.path, &backup_path)
            .map_err(|e| HistoryError::BackupFailed(format!("{}: {}", backup_path.display(), e)))?;

        Ok(backup_path)
    }
}

#[cfg(test)]
mod tests;
