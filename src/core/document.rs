// Copyright 2025 bakri (tidynest@proton.me)
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

//! The persisted history document and the edits the CLI can make to it
//!
//! Every mutation here is a plain in-memory operation. Nothing touches the
//! disk until the caller hands the document back to the `HistoryStore`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::types::{ImageRecord, OverlaySize, Policy};

/// Where images are searched by default
pub const DEFAULT_BASE_PATH: &str = "~/Pictures/";

/// Where overlay renders are cached by default
pub const DEFAULT_CACHE_PATH: &str = "~/.cache/sleep_backgrounds";

/// Top-level keys that `set` may change
pub const SETTABLE_KEYS: &[&str] = &[
    "penalty-weight-multiplier",
    "frequency-weight-multiplier",
    "new-image-weight-advantage",
    "base_path",
    "cache_path",
];

/// Errors from editing a history document
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    /// A command referenced an image that has no history entry
    #[error("Image '{0}' is not indexed in the history")]
    UnknownImage(String),

    /// `set` was given a key outside `SETTABLE_KEYS`
    #[error("'{0}' is not a settable top-level key")]
    UnknownPolicyKey(String),

    /// `set` was given a value of the wrong type
    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidPolicyValue {
        key: String,
        value: String,
        reason: String,
    },
}

fn default_cache_path() -> String {
    DEFAULT_CACHE_PATH.to_string()
}

/// Root of the persisted history / configuration file
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HistoryDocument {
    #[serde(flatten)]
    pub policy: Policy,

    /// Directory of candidate images, may start with `~`
    pub base_path: String,

    /// Directory for overlay renders, may start with `~`
    #[serde(default = "default_cache_path")]
    pub cache_path: String,

    /// Image key (relative to `base_path`) -> history
    pub images: BTreeMap<String, ImageRecord>,

    /// Overlay text -> measured box size, independent of the image
    #[serde(default)]
    pub overlay_sizes: BTreeMap<String, OverlaySize>,
}

impl Default for HistoryDocument {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            cache_path: default_cache_path(),
            images: BTreeMap::new(),
            overlay_sizes: BTreeMap::new(),
        }
    }
}

impl HistoryDocument {
    /// Records that `key` was just selected.
    ///
    /// Creates the entry for a newly discovered image, otherwise only
    /// `last-access` changes.
    pub fn record_selection(&mut self, key: &str, now: NaiveDateTime) {
        match self.images.get_mut(key) {
            Some(record) => record.last_access = now,
            None => {
                self.images.insert(key.to_string(), ImageRecord::new(now));
            }
        }
    }

    /// Force-indexes `key`, keeping any penalty or omit flag it already has.
    ///
    /// Returns true if the entry was newly created.
    pub fn index_image(&mut self, key: &str, now: NaiveDateTime) -> bool {
        let created = !self.images.contains_key(key);
        self.record_selection(key, now);
        created
    }

    /// Sets the manual penalty of an indexed image, returning the previous one
    pub fn set_penalty(&mut self, key: &str, penalty: i64) -> Result<i64, DocumentError> {
        let record = self
            .images
            .get_mut(key)
            .ok_or_else(|| DocumentError::UnknownImage(key.to_string()))?;

        Ok(std::mem::replace(&mut record.penalty_weight, penalty))
    }

    /// Flips the omit flag of an indexed image, returning the new value
    pub fn toggle_omit(&mut self, key: &str) -> Result<bool, DocumentError> {
        let record = self
            .images
            .get_mut(key)
            .ok_or_else(|| DocumentError::UnknownImage(key.to_string()))?;

        record.omit = !record.omit;
        Ok(record.omit)
    }

    /// Current value of a settable top-level key, formatted for display
    pub fn policy_value(&self, key: &str) -> Result<String, DocumentError> {
        match key {
            "penalty-weight-multiplier" => Ok(self.policy.penalty_weight_multiplier.to_string()),
            "frequency-weight-multiplier" => Ok(self.policy.frequency_weight_multiplier.to_string()),
            "new-image-weight-advantage" => Ok(self.policy.new_image_weight_advantage.to_string()),
            "base_path" => Ok(self.base_path.clone()),
            "cache_path" => Ok(self.cache_path.clone()),
            other => Err(DocumentError::UnknownPolicyKey(other.to_string())),
        }
    }

    /// Parses `value` for `key` and stores it, returning the previous value
    pub fn set_policy_value(&mut self, key: &str, value: &str) -> Result<String, DocumentError> {
        let previous = self.policy_value(key)?;
        let invalid = |reason: &str| DocumentError::InvalidPolicyValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match key {
            "penalty-weight-multiplier" => {
                self.policy.penalty_weight_multiplier =
                    value.trim().parse().map_err(|_| invalid("expected an integer"))?;
            }
            "frequency-weight-multiplier" => {
                self.policy.frequency_weight_multiplier = parse_finite(value).ok_or_else(|| invalid("expected a number"))?;
            }
            "new-image-weight-advantage" => {
                self.policy.new_image_weight_advantage = parse_finite(value).ok_or_else(|| invalid("expected a number"))?;
            }
            "base_path" | "cache_path" => {
                if value.trim().is_empty() {
                    return Err(invalid("path must not be empty"));
                }
                if key == "base_path" {
                    self.base_path = value.to_string();
                } else {
                    self.cache_path = value.to_string();
                }
            }
            other => return Err(DocumentError::UnknownPolicyKey(other.to_string())),
        }

        Ok(previous)
    }
}

fn parse_finite(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
