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

//! Text overlay renders with a per-image, per-text cache
//!
//! Rendering is delegated to an external compositor behind the
//! [`Compositor`] trait. Two things are cached in the history document:
//!
//! - `overlay_sizes`: text -> measured box size (measuring is slow)
//! - `overlay_maps` on each image: text -> path of the finished render
//!
//! A render failure never aborts a selection: it is logged and the
//! unmodified image is used instead.
//!
//! # Example
//! ```no_run
//! use sleep_background::core::HistoryDocument;
//! use sleep_background::overlay::{apply_overlay, ImageMagick};
//! use std::path::Path;
//!
//! let mut document = HistoryDocument::default();
//! let outcome = apply_overlay(
//!     &mut document,
//!     "sunset.png",
//!     Path::new("/home/user/Pictures/sunset.png"),
//!     Path::new("/home/user/.cache/sleep_backgrounds"),
//!     "Back in 5",
//!     &ImageMagick::default(),
//! );
//! println!("{}", outcome.path.display());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;

use crate::core::{HistoryDocument, OverlaySize};

/// Font used for every overlay
pub const OVERLAY_FONT: &str = "/usr/share/fonts/truetype/UbuntuMono/UbuntuMonoNerdFontMono-Bold.ttf";

/// Point size of the overlay text
pub const OVERLAY_POINT_SIZE: u32 = 72;

/// Border around the text box, ImageMagick geometry
pub const OVERLAY_BORDER: &str = "10x10";

/// Errors from the external compositor
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The program could not be started
    #[error("Failed to launch `{program}`: {source}")]
    Launch {
        program: &'static str,
        source: std::io::Error,
    },

    /// The program ran but reported failure
    #[error("`{program}` failed ({status})")]
    Failed {
        program: &'static str,
        status: ExitStatus,
    },

    /// Measurement output could not be understood
    #[error("Could not parse overlay measurement: {0}")]
    Measurement(String),

    /// Cache directory could not be created
    #[error("Cache directory {path} not writable: {source}")]
    CacheDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// External image-compositing collaborator
///
/// Font, size and border are fixed by the implementation; changing them
/// means cached renders no longer match and should be cleared by hand.
pub trait Compositor {
    /// Measures the box needed to draw `text` as an overlay
    fn measure(&self, text: &str) -> Result<OverlaySize, OverlayError>;

    /// Draws `text` centred on `source` and writes the result to `destination`
    fn render(
        &self,
        source: &Path,
        text: &str,
        size: OverlaySize,
        destination: &Path,
    ) -> Result<(), OverlayError>;
}

/// Where the returned path came from
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OverlaySource {
    /// An existing render was reused
    Cached,
    /// A new render was produced and recorded
    Rendered,
    /// Rendering failed, the unmodified image is used
    Fallback,
}

/// Result of [`apply_overlay`]
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayOutcome {
    /// Image to show on the lock screen
    pub path: PathBuf,
    pub source: OverlaySource,
    /// True if `overlay_sizes` or `overlay_maps` changed and need saving
    pub document_changed: bool,
}

impl OverlayOutcome {
    fn fallback(source_image: &Path, document_changed: bool) -> Self {
        Self {
            path: source_image.to_path_buf(),
            source: OverlaySource::Fallback,
            document_changed,
        }
    }
}

/// Looks up or creates the render of `key` with `text` on it.
///
/// `source_image` is the resolved path of `key`; `cache_dir` is the resolved
/// `cache_path`. Never fails: every error degrades to `source_image`.
pub fn apply_overlay(
    document: &mut HistoryDocument,
    key: &str,
    source_image: &Path,
    cache_dir: &Path,
    text: &str,
    compositor: &dyn Compositor,
) -> OverlayOutcome {
    if let Some(cached) = document
        .images
        .get(key)
        .and_then(|record| record.overlay_maps.get(text))
    {
        if cached.is_file() {
            tracing::info!("Reuse cached overlay {} for '{}'", cached.display(), key);
            return OverlayOutcome {
                path: cached.clone(),
                source: OverlaySource::Cached,
                document_changed: false,
            };
        }
        tracing::warn!(
            "Cached overlay {} for '{}' is missing, rendering again",
            cached.display(),
            key
        );
    }

    let mut document_changed = false;
    let size = match document.overlay_sizes.get(text) {
        Some(size) => *size,
        None => match compositor.measure(text) {
            Ok(size) => {
                document.overlay_sizes.insert(text.to_string(), size);
                document_changed = true;
                size
            }
            Err(e) => {
                tracing::error!("Failed to measure overlay '{}': {}. Revert to original selection", text, e);
                return OverlayOutcome::fallback(source_image, document_changed);
            }
        },
    };
    tracing::info!("Overlay size for text '{}': {}", text, size);

    if let Err(e) = fs::create_dir_all(cache_dir) {
        let e = OverlayError::CacheDir {
            path: cache_dir.to_path_buf(),
            source: e,
        };
        tracing::error!("{}. Revert to original selection", e);
        return OverlayOutcome::fallback(source_image, document_changed);
    }

    let stem = Path::new(key)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("background");
    let destination = unique_cache_path(cache_dir, stem);

    tracing::info!("Creating cached overlay image {}", destination.display());
    if let Err(e) = compositor.render(source_image, text, size, &destination) {
        tracing::error!("Failed to create overlay image: {}. Revert to original selection", e);
        return OverlayOutcome::fallback(source_image, document_changed);
    }

    match document.images.get_mut(key) {
        Some(record) => {
            record.overlay_maps.insert(text.to_string(), destination.clone());
        }
        None => tracing::warn!("'{}' has no history entry, overlay render not recorded", key),
    }

    OverlayOutcome {
        path: destination,
        source: OverlaySource::Rendered,
        document_changed: true,
    }
}

/// First `cache_dir/<stem>_<n>.png` that does not exist yet
pub fn unique_cache_path(cache_dir: &Path, stem: &str) -> PathBuf {
    let mut id = 0u64;
    loop {
        let candidate = cache_dir.join(format!("{}_{}.png", stem, id));
        if !candidate.exists() {
            return candidate;
        }
        id += 1;
    }
}

/// ImageMagick (`convert` + `identify`) compositor
#[derive(Clone, Debug)]
pub struct ImageMagick {
    pub font: String,
    pub point_size: u32,
    pub border: String,
}

impl Default for ImageMagick {
    fn default() -> Self {
        Self {
            font: OVERLAY_FONT.to_string(),
            point_size: OVERLAY_POINT_SIZE,
            border: OVERLAY_BORDER.to_string(),
        }
    }
}

impl ImageMagick {
    fn run(program: &'static str, args: &[String]) -> Result<Vec<u8>, OverlayError> {
        tracing::debug!("Running {} {:?}", program, args);
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| OverlayError::Launch { program, source })?;

        if !output.status.success() {
            tracing::debug!("{} stderr: {}", program, String::from_utf8_lossy(&output.stderr));
            return Err(OverlayError::Failed {
                program,
                status: output.status,
            });
        }
        Ok(output.stdout)
    }

    fn label_args(&self, text: &str) -> Vec<String> {
        vec![
            "-background".into(),
            "none".into(),
            "-fill".into(),
            "white".into(),
            "-font".into(),
            self.font.clone(),
            "-pointsize".into(),
            self.point_size.to_string(),
            format!("label:{}", text),
            "-trim".into(),
            "+repage".into(),
            "-bordercolor".into(),
            "none".into(),
            "-border".into(),
            self.border.clone(),
        ]
    }
}

impl Compositor for ImageMagick {
    fn measure(&self, text: &str) -> Result<OverlaySize, OverlayError> {
        let scratch = std::env::temp_dir().join(format!("overlay_measure_{}.png", std::process::id()));

        let mut args = self.label_args(text);
        args.push(scratch.display().to_string());
        Self::run("convert", &args)?;

        let measured = Self::run(
            "identify",
            &["-format".into(), "%w,%h".into(), scratch.display().to_string()],
        );
        if let Err(e) = fs::remove_file(&scratch) {
            tracing::debug!("Could not remove {}: {}", scratch.display(), e);
        }

        let measured = String::from_utf8_lossy(&measured?).trim().to_string();
        measured.parse().map_err(OverlayError::Measurement)
    }

    fn render(
        &self,
        source: &Path,
        text: &str,
        size: OverlaySize,
        destination: &Path,
    ) -> Result<(), OverlayError> {
        let mut args = vec![source.display().to_string(), "(".into()];
        args.extend(self.label_args(text));
        args.extend([
            "-alpha".into(),
            "set".into(),
            "-channel".into(),
            "A".into(),
            "-evaluate".into(),
            "set".into(),
            "0".into(),
            "+channel".into(),
            "-fill".into(),
            "rgba(0,0,0,0.6)".into(),
            "-draw".into(),
            format!("roundrectangle 0,0 {} 10,10", size),
            "-blur".into(),
            "0x3".into(),
            ")".into(),
            "-gravity".into(),
            "center".into(),
            "-compose".into(),
            "over".into(),
            "-composite".into(),
            "-font".into(),
            self.font.clone(),
            "-pointsize".into(),
            self.point_size.to_string(),
            "-fill".into(),
            "white".into(),
            "-gravity".into(),
            "center".into(),
            "-annotate".into(),
            "+0+0".into(),
            text.to_string(),
            destination.display().to_string(),
        ]);

        Self::run("convert", &args).map(|_| ())
    }
}

#[cfg(test)]
mod tests;
