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

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// On-disk format of every `last-access` value
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a `last-access` string (`YYYY-MM-DD HH:MM:SS`)
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
}

/// Current local time, truncated to whole seconds to match the on-disk precision
pub fn now_timestamp() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Serde adapter keeping timestamps parsed in memory and formatted on disk.
///
/// Formatting only happens inside `serialize`, so a document that has just
/// been saved still holds `NaiveDateTime` values.
pub(crate) mod timestamp {
    use super::{parse_timestamp, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(|e| de::Error::custom(format!("bad timestamp '{}': {}", raw, e)))
    }
}

/// Selection policy numbers
///
/// These are the three top-level multipliers of the history document. They
/// are passed explicitly into the weight engine rather than read from any
/// shared state.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Policy {
    /// Multiplies each image's manual penalty (normally negative)
    #[serde(rename = "penalty-weight-multiplier")]
    pub penalty_weight_multiplier: i64,

    /// Height of the recency curve
    #[serde(rename = "frequency-weight-multiplier")]
    pub frequency_weight_multiplier: f64,

    /// Flat bonus for images that have never been selected
    #[serde(rename = "new-image-weight-advantage")]
    pub new_image_weight_advantage: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            penalty_weight_multiplier: -1,
            frequency_weight_multiplier: 1.0,
            new_image_weight_advantage: 1.0,
        }
    }
}

impl Policy {
    /// Returns this policy with any per-run overrides applied.
    ///
    /// The receiver is left untouched, so overrides can never leak into the
    /// persisted document.
    pub fn with_overrides(&self, overrides: &PolicyOverrides) -> Self {
        Self {
            penalty_weight_multiplier: overrides
                .penalty_weight_multiplier
                .unwrap_or(self.penalty_weight_multiplier),
            frequency_weight_multiplier: overrides
                .frequency_weight_multiplier
                .unwrap_or(self.frequency_weight_multiplier),
            new_image_weight_advantage: overrides
                .new_image_weight_advantage
                .unwrap_or(self.new_image_weight_advantage),
        }
    }
}

/// Per-invocation replacements for policy values. Never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PolicyOverrides {
    pub penalty_weight_multiplier: Option<i64>,
    pub frequency_weight_multiplier: Option<f64>,
    pub new_image_weight_advantage: Option<f64>,
}

impl PolicyOverrides {
    /// True when no value is overridden
    pub fn is_empty(&self) -> bool {
        self.penalty_weight_multiplier.is_none()
            && self.frequency_weight_multiplier.is_none()
            && self.new_image_weight_advantage.is_none()
    }
}

/// History of a single image, keyed by its path relative to `base_path`
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ImageRecord {
    /// When the image was last selected (or indexed)
    #[serde(rename = "last-access", with = "timestamp")]
    pub last_access: NaiveDateTime,

    /// Manual penalty, multiplied by `penalty-weight-multiplier`
    #[serde(rename = "penalty-weight")]
    pub penalty_weight: i64,

    /// Hard exclusion from the selection pool
    pub omit: bool,

    /// Overlay text -> cached render of this image with that text applied
    #[serde(default)]
    pub overlay_maps: BTreeMap<String, PathBuf>,
}

impl ImageRecord {
    /// Fresh record for a previously unseen image
    pub fn new(last_access: NaiveDateTime) -> Self {
        Self {
            last_access,
            penalty_weight: 0,
            omit: false,
            overlay_maps: BTreeMap::new(),
        }
    }
}

/// Pixel size of a rendered overlay box
///
/// Stored on disk as `"W,H"`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct OverlaySize {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for OverlaySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.width, self.height)
    }
}

impl FromStr for OverlaySize {
    type Err = String;

    /// Accepts `W,H` as well as ImageMagick's `WxH`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .trim()
            .split_once([',', 'x'])
            .ok_or_else(|| format!("Invalid overlay size '{}': expected W,H", s))?;

        let width = width
            .trim()
            .parse()
            .map_err(|_| format!("Invalid overlay width in '{}'", s))?;
        let height = height
            .trim()
            .parse()
            .map_err(|_| format!("Invalid overlay height in '{}'", s))?;

        Ok(Self { width, height })
    }
}

impl TryFrom<String> for OverlaySize {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OverlaySize> for String {
    fn from(size: OverlaySize) -> Self {
        size.to_string()
    }
}

/// Result of reconciling the history against the image directory
///
/// - `known`: history keys whose file still exists
/// - `discovered`: supported files on disk with no history entry yet
/// - `missing`: history keys whose file is gone (kept in the document)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CandidatePool {
    pub known: BTreeSet<String>,
    pub discovered: BTreeSet<String>,
    pub missing: Vec<String>,
}

impl CandidatePool {
    /// Number of selectable candidates (known + discovered)
    pub fn len(&self) -> usize {
        self.known.len() + self.discovered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.known.contains(key) || self.discovered.contains(key)
    }
}
