//! Selection weight computation
//!
//! Every candidate image gets one scalar weight built from three parts:
//!
//! 1. **Base weight**: `penalty-weight-multiplier * penalty-weight` for known
//!    images, `new-image-weight-advantage` for newly discovered ones
//! 2. **Novelty bonus**: the apex of the recency curve, added to new images
//!    so they are not permanently behind old, rarely picked images
//! 3. **Recency contribution**: a quadratic function of how old an image's
//!    `last-access` is relative to the rest of the pool
//!
//! The recency curve is the parabola `f(x) = alpha * x * (beta - x)` with
//! `alpha = frequency-weight-multiplier / n` and `beta = 2n`. It is zero at
//! the most recently used image and grows quadratically up to its apex at
//! `x = n`, which lies past the oldest rank, so across the ranks actually
//! populated it only increases.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::core::types::{CandidatePool, ImageRecord, Policy};

/// The quadratic recency curve for a pool of `n` candidates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecencyCurve {
    alpha: f64,
    beta: f64,
    n: f64,
}

impl RecencyCurve {
    /// Builds the curve for `candidates` images (must be non-zero).
    pub fn new(frequency_weight_multiplier: f64, candidates: usize) -> Self {
        let n = candidates as f64;
        Self {
            alpha: frequency_weight_multiplier / n,
            beta: 2.0 * n,
            n,
        }
    }

    /// Extra weight for the image at recency rank `x` (0 = most recent)
    pub fn at(&self, x: f64) -> f64 {
        (self.alpha * x) * (self.beta - x)
    }

    /// Maximum of the curve, reached at `x = n`
    pub fn vertex(&self) -> f64 {
        self.alpha * self.n * self.n
    }
}

/// Why a candidate was removed from the survivor set
#[derive(Clone, Debug, PartialEq)]
pub enum ExclusionReason {
    /// The image carries `omit = true`
    Omitted,
    /// The final weight came out negative
    NegativeWeight(f64),
}

/// A candidate that did not survive weighting
#[derive(Clone, Debug, PartialEq)]
pub struct Exclusion {
    pub key: String,
    pub reason: ExclusionReason,
}

/// Output of the weight engine
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Weighting {
    /// Survivor key -> weight (never negative)
    pub weights: BTreeMap<String, f64>,
    /// Candidates dropped by omit or negative weight
    pub excluded: Vec<Exclusion>,
}

impl Weighting {
    /// True when candidates existed but none survived
    pub fn all_excluded(&self) -> bool {
        self.weights.is_empty() && !self.excluded.is_empty()
    }
}

/// Starting weight of every candidate before novelty and recency
pub fn base_weights(
    policy: &Policy,
    images: &BTreeMap<String, ImageRecord>,
    pool: &CandidatePool,
) -> BTreeMap<String, f64> {
    let mut weights = BTreeMap::new();

    for key in &pool.known {
        let penalty = images.get(key).map_or(0, |record| record.penalty_weight);
        let adjust = policy.penalty_weight_multiplier.saturating_mul(penalty) as f64;
        if adjust != 0.0 {
            tracing::debug!("Adjusted base weight for '{}': {}", key, adjust);
        }
        weights.insert(key.clone(), adjust);
    }

    for key in &pool.discovered {
        tracing::debug!(
            "Initialize NEW image '{}' with weight {}",
            key,
            policy.new_image_weight_advantage
        );
        weights.insert(key.clone(), policy.new_image_weight_advantage);
    }

    weights
}

/// Computes the survivor set and its weights for one selection.
///
/// Known images are ranked by `last-access`, newest first; ties are broken
/// by key so the ranking is reproducible. Omitted images still occupy a rank
/// and count towards `n`; they are only removed at the end.
pub fn compute_weights(
    policy: &Policy,
    images: &BTreeMap<String, ImageRecord>,
    pool: &CandidatePool,
) -> Weighting {
    if pool.is_empty() {
        return Weighting::default();
    }

    let mut weights = base_weights(policy, images, pool);
    let curve = RecencyCurve::new(policy.frequency_weight_multiplier, pool.len());

    let vertex = curve.vertex();
    if vertex > 0.0 {
        for key in &pool.discovered {
            tracing::debug!("Fix NEW image weight for '{}' by adding {}", key, vertex);
            if let Some(weight) = weights.get_mut(key) {
                *weight += vertex;
            }
        }
    }

    let mut ranked: Vec<(&String, &ImageRecord)> = pool
        .known
        .iter()
        .filter_map(|key| images.get(key).map(|record| (key, record)))
        .collect();
    ranked.sort_by_key(|(key, record)| (Reverse(record.last_access), *key));

    for (rank, (key, record)) in ranked.iter().enumerate() {
        let extra = curve.at(rank as f64);
        tracing::debug!(
            "Add weight {} to '{}' based on last-access {}",
            extra,
            key,
            record.last_access
        );
        if let Some(weight) = weights.get_mut(*key) {
            *weight += extra;
        }
    }

    let mut result = Weighting::default();
    for (key, weight) in weights {
        if images.get(&key).is_some_and(|record| record.omit) {
            tracing::info!("Omit '{}' due to hard-omit flag", key);
            result.excluded.push(Exclusion {
                key,
                reason: ExclusionReason::Omitted,
            });
        } else if weight < 0.0 {
            tracing::info!("Drop '{}' for negative weight: {}", key, weight);
            result.excluded.push(Exclusion {
                key,
                reason: ExclusionReason::NegativeWeight(weight),
            });
        } else {
            tracing::debug!("Set weight for '{}' = {}", key, weight);
            result.weights.insert(key, weight);
        }
    }

    result
}
