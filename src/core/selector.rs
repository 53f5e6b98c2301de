//! Weighted random draw over the survivor set
//!
//! Candidates are walked in key order (the `BTreeMap` order), so a given
//! draw always resolves to the same key. The walk is implemented as a
//! prefix-sum array over the positive weights, searched with
//! `partition_point`: the selected candidate is the first one whose
//! cumulative weight is strictly greater than the draw. Zero-weight keys
//! never own a slice of `[0, total)` and cannot be selected unless every
//! weight is zero.

use rand::Rng;
use std::collections::BTreeMap;
use thiserror::Error;

/// Selection errors
#[derive(Debug, Error, PartialEq)]
pub enum SelectError {
    /// Nothing to choose from
    #[error("No candidates available for selection")]
    EmptyCandidateSet,

    /// A weight was negative, NaN or infinite
    #[error("Invalid weight {weight} for '{key}'")]
    InvalidWeight { key: String, weight: f64 },

    /// The weights are finite but their sum is not
    #[error("Total weight overflows")]
    TotalOverflow,
}

/// Sum of all weights, rejecting anything the walk cannot handle
pub fn total_weight(weights: &BTreeMap<String, f64>) -> Result<f64, SelectError> {
    if weights.is_empty() {
        return Err(SelectError::EmptyCandidateSet);
    }

    let mut total = 0.0;
    for (key, &weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            return Err(SelectError::InvalidWeight {
                key: key.clone(),
                weight,
            });
        }
        total += weight;
    }

    if !total.is_finite() {
        return Err(SelectError::TotalOverflow);
    }
    Ok(total)
}

/// Draws one key with probability proportional to its weight.
///
/// The draw is a uniform `f64` in `[0, total)`. When every weight is zero
/// the choice is uniform over all keys instead.
pub fn choose_weighted<'a, R: Rng + ?Sized>(
    weights: &'a BTreeMap<String, f64>,
    rng: &mut R,
) -> Result<&'a str, SelectError> {
    let total = total_weight(weights)?;

    if total == 0.0 {
        let index = rng.random_range(0..weights.len());
        let key = choose_with_draw(weights, index as f64)?;
        tracing::info!("All weights are zero, uniform choice selects '{}'", key);
        return Ok(key);
    }

    let draw = rng.random_range(0.0..total);
    tracing::info!(
        "Available keys and weights for selection: {:?} (Sum weight: {})",
        weights,
        total
    );

    let key = choose_with_draw(weights, draw)?;
    tracing::info!("Random draw {:.4} selects key '{}'", draw, key);
    Ok(key)
}

/// Resolves a given draw to a key by walking the cumulative weights.
///
/// Key `k` owns the half-open slice `[before_k, before_k + weight_k)`. A
/// draw at or beyond the total (only possible through float rounding)
/// lands on the last positive-weight key. When every weight is zero the
/// draw is read as an index into the keys.
pub fn choose_with_draw(weights: &BTreeMap<String, f64>, draw: f64) -> Result<&str, SelectError> {
    let total = total_weight(weights)?;

    if total == 0.0 {
        let index = if draw.is_finite() && draw > 0.0 { draw as usize } else { 0 };
        return weights
            .keys()
            .nth(index)
            .or_else(|| weights.keys().last())
            .map(String::as_str)
            .ok_or(SelectError::EmptyCandidateSet);
    }

    let mut running = 0.0;
    let cumulative: Vec<(&str, f64)> = weights
        .iter()
        .filter(|(_, weight)| **weight > 0.0)
        .map(|(key, weight)| {
            running += weight;
            (key.as_str(), running)
        })
        .collect();

    let index = cumulative.partition_point(|(_, sum)| *sum <= draw);
    cumulative
        .get(index)
        .or_else(|| cumulative.last())
        .map(|(key, _)| *key)
        .ok_or(SelectError::EmptyCandidateSet)
}
