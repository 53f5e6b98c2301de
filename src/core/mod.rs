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

//! src/core/mod.rs
//!
//! Core selection logic
//!
//! This module contains the data model and the algorithms that turn a
//! history document into one chosen image:
//! - Type definitions for the history document and its records
//! - Weight computation (penalty, novelty and quadratic recency)
//! - Weighted random selection over the survivor set
//!
//! Nothing in here reads or writes files, so all of it can be unit tested
//! with plain in-memory values.

pub mod document;
pub mod selector;
pub mod types;
pub mod weights;

pub use document::{DocumentError, HistoryDocument};
pub use selector::{choose_weighted, choose_with_draw, SelectError};
pub use types::*;
pub use weights::{compute_weights, ExclusionReason, RecencyCurve, Weighting};

#[cfg(test)]
mod tests;
