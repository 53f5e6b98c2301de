//! Core module tests
//!
//! Contains test suites for core functionality:
//! - Document edits and serde (timestamps, overlay sizes)
//! - Weight computation (penalty, novelty, recency, pruning)
//! - Weighted selection
