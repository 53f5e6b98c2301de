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

//! Sleep Background Picker
//!
//! Picks a lock screen background by weighted random draw, favouring images
//! that have not been shown for a long time, and remembers every choice in a
//! small JSON history.
//!
//! # Features
//!
//! - **Recency weighting:** Quadratic curve over last-access rank
//! - **Novelty bonus:** New files in the image directory are picked up automatically
//! - **Manual control:** Per-image penalties and hard omits
//! - **Text overlays:** Cached renders of an image with a message on it
//! - **Atomic Operations:** History writes never leave a half-written file
//!
//! # Architecture
//!
//! - **`core`:** Data model, weight engine, selector (no I/O)
//! - **`history`:** History file load/validate/save and directory reconciliation
//! - **`overlay`:** External compositor and overlay cache
//! - **`picker`:** The full load, weight, draw, persist pipeline
//!
//! # Examples
//!
//! ## Weighting a document
//!
//! ```no_run
//! use sleep_background::history::HistoryStore;
//! use sleep_background::picker::evaluate;
//! use sleep_background::core::PolicyOverrides;
//!
//! let store = HistoryStore::new("/home/user/.config/i3/sleep_history.json");
//! let document = store.load()?;
//! let weighting = evaluate(&document, &PolicyOverrides::default())?;
//! for (key, weight) in &weighting.weights {
//!     println!("{key}: {weight}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Drawing from weights
//!
//! ```
//! use sleep_background::core::choose_with_draw;
//! use std::collections::BTreeMap;
//!
//! let weights = BTreeMap::from([("a.png".to_string(), 5.0), ("b.png".to_string(), 5.0)]);
//! assert_eq!(choose_with_draw(&weights, 4.0)?, "a.png");
//! assert_eq!(choose_with_draw(&weights, 7.0)?, "b.png");
//! # Ok::<(), sleep_background::core::SelectError>(())
//! ```

pub mod core;
pub mod history;
pub mod overlay;
pub mod picker;

// Re-export commonly used types for convenience
pub use core::{HistoryDocument, ImageRecord, Policy, PolicyOverrides};
pub use history::{HistoryError, HistoryStore};
pub use picker::{pick, PickError, PickRequest, Selection};
