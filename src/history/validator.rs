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

//! Shape validation for the history document
//!
//! The document is checked as raw JSON before it is deserialised, so a
//! failure can name the exact key (and image) that is wrong instead of a
//! generic serde message. The check runs in three passes:
//!
//! 1. **Syntax**: the text must be JSON (line/column reported)
//! 2. **Shape**: every required top-level and per-image key is present
//! 3. **Timestamps**: every `last-access` parses as `YYYY-MM-DD HH:MM:SS`
//!
//! Only then is the value converted into a `HistoryDocument`.
//!
//! # Example
//!
//! ```
//! use sleep_background::history::validator::parse_document;
//! use std::path::Path;
//!
//! let content = r#"{
//!     "penalty-weight-multiplier": -1,
//!     "frequency-weight-multiplier": 1,
//!     "new-image-weight-advantage": 1,
//!     "base_path": "~/Pictures/",
//!     "images": {}
//! }"#;
//!
//! let document = parse_document(content, Path::new("sleep_history.json"))?;
//! assert!(document.images.is_empty());
//! # Ok::<(), sleep_background::history::HistoryError>(())
//! ```

use serde_json::{Map, Value};
use std::path::Path;

use crate::core::{parse_timestamp, HistoryDocument};
use crate::history::HistoryError;

/// Keys every document must carry at the top level
pub const REQUIRED_KEYS: &[&str] = &[
    "penalty-weight-multiplier",
    "frequency-weight-multiplier",
    "new-image-weight-advantage",
    "base_path",
    "images",
];

/// Keys every image entry must carry
pub const REQUIRED_IMAGE_KEYS: &[&str] = &["last-access", "penalty-weight", "omit"];

/// Parses and validates the full text of a history file.
///
/// # Errors
///
/// - `HistoryError::Syntax` if the text is not JSON
/// - `HistoryError::MissingKey` / `MissingImageKey` for absent keys
/// - `HistoryError::BadTimestamp` for a malformed `last-access`
/// - `HistoryError::InvalidValue` if a value has the wrong type
pub fn parse_document(content: &str, path: &Path) -> Result<HistoryDocument, HistoryError> {
    let value: Value = serde_json::from_str(content).map_err(|e| HistoryError::Syntax {
        path: path.to_path_buf(),
        line: e.line(),
        column: e.column(),
        message: e.to_string(),
    })?;

    validate_shape(&value)?;

    serde_json::from_value(value).map_err(|e| HistoryError::InvalidValue(e.to_string()))
}

/// Checks required keys and timestamps without deserialising.
pub fn validate_shape(value: &Value) -> Result<(), HistoryError> {
    let root = value
        .as_object()
        .ok_or_else(|| HistoryError::InvalidValue("document root must be an object".to_string()))?;

    for key in REQUIRED_KEYS {
        if !root.contains_key(*key) {
            return Err(HistoryError::MissingKey(key));
        }
    }

    let images = root
        .get("images")
        .and_then(Value::as_object)
        .ok_or_else(|| HistoryError::InvalidValue("'images' must be an object".to_string()))?;

    for (image, entry) in images {
        validate_image(image, entry)?;
    }

    Ok(())
}

fn validate_image(image: &str, entry: &Value) -> Result<(), HistoryError> {
    let entry: &Map<String, Value> = entry.as_object().ok_or_else(|| {
        HistoryError::InvalidValue(format!("image entry for '{}' must be an object", image))
    })?;

    for key in REQUIRED_IMAGE_KEYS {
        if !entry.contains_key(*key) {
            return Err(HistoryError::MissingImageKey {
                image: image.to_string(),
                key,
            });
        }
    }

    let raw = entry.get("last-access").and_then(Value::as_str);
    match raw.map(parse_timestamp) {
        Some(Ok(_)) => Ok(()),
        _ => Err(HistoryError::BadTimestamp {
            image: image.to_string(),
            value: entry
                .get("last-access")
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                .unwrap_or_default(),
        }),
    }
}
