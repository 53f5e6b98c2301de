//! One full selection: load, reconcile, weight, draw, persist
//!
//! This is the whole linear invocation behind the default command. The
//! history document is owned exclusively for the duration of the call and
//! written back in full; concurrent invocations are last-writer-wins.

use rand::Rng;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::{
    choose_weighted, compute_weights, now_timestamp, HistoryDocument, PolicyOverrides,
    SelectError, Weighting,
};
use crate::history::{expand_path, reconcile, HistoryError, HistoryStore};
use crate::overlay::{apply_overlay, Compositor, OverlaySource};

/// Errors that end a selection without a chosen image
#[derive(Debug, Error)]
pub enum PickError {
    #[error(transparent)]
    History(#[from] HistoryError),

    /// The image directory holds no candidates at all
    #[error("No candidate images found in {0}")]
    NoCandidates(PathBuf),

    /// Candidates exist but every one was omitted or weighted negative
    #[error("All {0} candidate images were excluded (omitted or negative weight)")]
    AllExcluded(usize),

    #[error(transparent)]
    Select(SelectError),
}

/// Options for one selection
#[derive(Clone, Debug, Default)]
pub struct PickRequest {
    /// Policy replacements for this run only
    pub overrides: PolicyOverrides,
    /// Text to draw on the chosen image
    pub overlay_text: Option<String>,
}

/// The chosen background
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    /// History key of the chosen image
    pub key: String,
    /// File to display (the overlay render if one was applied)
    pub image_path: PathBuf,
    /// Set when overlay text was requested
    pub overlay: Option<OverlaySource>,
}

impl Selection {
    /// Shell command a wrapper script can `eval` to lock the screen
    pub fn lock_command(&self) -> String {
        format!("i3lock -utfe -i \"{}\"", self.image_path.display())
    }
}

/// Reconciles `document` with its image directory and computes weights.
///
/// Shared by the real selection and the `parse --with-weights` dry run.
pub fn evaluate(
    document: &HistoryDocument,
    overrides: &PolicyOverrides,
) -> Result<Weighting, HistoryError> {
    let policy = document.policy.with_overrides(overrides);
    if !overrides.is_empty() {
        tracing::info!("Policy for this run (not persisted): {:?}", policy);
    }

    let base_path = expand_path(&document.base_path);
    let pool = reconcile(document, &base_path)?;
    Ok(compute_weights(&policy, &document.images, &pool))
}

/// Runs one selection and persists its outcome.
///
/// The chosen image's `last-access` is saved before any overlay work, so a
/// failing compositor can never lose the selection.
pub fn pick<R: Rng + ?Sized>(
    store: &HistoryStore,
    request: &PickRequest,
    compositor: &dyn Compositor,
    rng: &mut R,
) -> Result<Selection, PickError> {
    let mut document = store.load()?;
    let base_path = expand_path(&document.base_path);

    let weighting = evaluate(&document, &request.overrides)?;
    let key = match choose_weighted(&weighting.weights, rng) {
        Ok(key) => key.to_string(),
        Err(SelectError::EmptyCandidateSet) if weighting.all_excluded() => {
            return Err(PickError::AllExcluded(weighting.excluded.len()));
        }
        Err(SelectError::EmptyCandidateSet) => return Err(PickError::NoCandidates(base_path)),
        Err(e) => return Err(PickError::Select(e)),
    };

    document.record_selection(&key, now_timestamp());
    store.save(&document)?;

    let source_image = base_path.join(&key);
    let Some(text) = request.overlay_text.as_deref() else {
        return Ok(Selection {
            key,
            image_path: source_image,
            overlay: None,
        });
    };

    let cache_dir = expand_path(&document.cache_path);
    let outcome = apply_overlay(&mut document, &key, &source_image, &cache_dir, text, compositor);
    if outcome.document_changed {
        store.save(&document)?;
    }

    Ok(Selection {
        key,
        image_path: outcome.path,
        overlay: Some(outcome.source),
    })
}
