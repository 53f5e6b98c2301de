//! History module tests
//!
//! - Store: load/init/save, validation failures, round trips
//! - Catalog: reconciling history keys with the image directory

#[cfg(test)]
mod store_tests;
