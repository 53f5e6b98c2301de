//! Overlay cache tests
//!
//! A fake compositor stands in for ImageMagick: it writes a marker file on
//! render and counts how often each operation runs.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::*;
use crate::core::{parse_timestamp, ImageRecord};

struct FakeCompositor {
    measure_calls: Cell<usize>,
    render_calls: Cell<usize>,
    fail_measure: bool,
    fail_render: bool,
}

impl FakeCompositor {
    fn working() -> Self {
        Self {
            measure_calls: Cell::new(0),
            render_calls: Cell::new(0),
            fail_measure: false,
            fail_render: false,
        }
    }
}

impl Compositor for FakeCompositor {
    fn measure(&self, text: &str) -> Result<OverlaySize, OverlayError> {
        self.measure_calls.set(self.measure_calls.get() + 1);
        if self.fail_measure {
            return Err(OverlayError::Measurement("no output".to_string()));
        }
        Ok(OverlaySize {
            width: 40 * text.len() as u32,
            height: 90,
        })
    }

    fn render(
        &self,
        _source: &Path,
        text: &str,
        size: OverlaySize,
        destination: &Path,
    ) -> Result<(), OverlayError> {
        self.render_calls.set(self.render_calls.get() + 1);
        if self.fail_render {
            return Err(OverlayError::Measurement("render refused".to_string()));
        }
        fs::write(destination, format!("{} @ {}", text, size)).unwrap();
        Ok(())
    }
}

/// Helper: document knowing `sunset.png`, plus a cache dir and source path
fn setup() -> (TempDir, HistoryDocument, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("sunset.png");
    fs::write(&source, b"png").unwrap();
    let cache = temp_dir.path().join("cache");

    let mut document = HistoryDocument::default();
    document.images.insert(
        "sunset.png".to_string(),
        ImageRecord::new(parse_timestamp("2024-01-01 00:00:00").unwrap()),
    );
    (temp_dir, document, source, cache)
}

#[test]
fn test_first_render_is_recorded() {
    let (_temp_dir, mut document, source, cache) = setup();
    let compositor = FakeCompositor::working();

    let outcome = apply_overlay(&mut document, "sunset.png", &source, &cache, "Back in 5", &compositor);

    assert_eq!(outcome.source, OverlaySource::Rendered);
    assert!(outcome.document_changed);
    assert_eq!(outcome.path, cache.join("sunset_0.png"));
    assert!(outcome.path.is_file());
    assert_eq!(document.images["sunset.png"].overlay_maps["Back in 5"], outcome.path);
    assert_eq!(
        document.overlay_sizes["Back in 5"],
        OverlaySize { width: 360, height: 90 }
    );
}

#[test]
fn test_second_request_reuses_render() {
    let (_temp_dir, mut document, source, cache) = setup();
    let compositor = FakeCompositor::working();

    let first = apply_overlay(&mut document, "sunset.png", &source, &cache, "hi", &compositor);
    let second = apply_overlay(&mut document, "sunset.png", &source, &cache, "hi", &compositor);

    assert_eq!(second.source, OverlaySource::Cached);
    assert!(!second.document_changed);
    assert_eq!(second.path, first.path);
    assert_eq!(compositor.render_calls.get(), 1);
    assert_eq!(compositor.measure_calls.get(), 1);
}

#[test]
fn test_measured_size_shared_across_images() {
    let (_temp_dir, mut document, source, cache) = setup();
    document.images.insert(
        "forest.png".to_string(),
        ImageRecord::new(parse_timestamp("2024-01-01 00:00:00").unwrap()),
    );
    let compositor = FakeCompositor::working();

    apply_overlay(&mut document, "sunset.png", &source, &cache, "hi", &compositor);
    let other = apply_overlay(&mut document, "forest.png", &source, &cache, "hi", &compositor);

    assert_eq!(other.source, OverlaySource::Rendered);
    assert_eq!(other.path, cache.join("forest_0.png"));
    assert_eq!(compositor.measure_calls.get(), 1);
    assert_eq!(compositor.render_calls.get(), 2);
}

#[test]
fn test_new_text_gets_new_file() {
    let (_temp_dir, mut document, source, cache) = setup();
    let compositor = FakeCompositor::working();

    let first = apply_overlay(&mut document, "sunset.png", &source, &cache, "one", &compositor);
    let second = apply_overlay(&mut document, "sunset.png", &source, &cache, "two", &compositor);

    assert_eq!(first.path, cache.join("sunset_0.png"));
    assert_eq!(second.path, cache.join("sunset_1.png"));
    assert_eq!(document.images["sunset.png"].overlay_maps.len(), 2);
}

#[test]
fn test_deleted_render_is_recreated() {
    let (_temp_dir, mut document, source, cache) = setup();
    let compositor = FakeCompositor::working();

    let first = apply_overlay(&mut document, "sunset.png", &source, &cache, "hi", &compositor);
    fs::remove_file(&first.path).unwrap();

    let again = apply_overlay(&mut document, "sunset.png", &source, &cache, "hi", &compositor);
    assert_eq!(again.source, OverlaySource::Rendered);
    assert!(again.path.is_file());
    assert_eq!(compositor.render_calls.get(), 2);
}

#[test]
fn test_render_failure_falls_back() {
    let (_temp_dir, mut document, source, cache) = setup();
    let compositor = FakeCompositor {
        fail_render: true,
        ..FakeCompositor::working()
    };

    let outcome = apply_overlay(&mut document, "sunset.png", &source, &cache, "hi", &compositor);

    assert_eq!(outcome.source, OverlaySource::Fallback);
    assert_eq!(outcome.path, source);
    assert!(document.images["sunset.png"].overlay_maps.is_empty());
    // The measurement still succeeded and is worth keeping
    assert!(outcome.document_changed);
}

#[test]
fn test_measure_failure_falls_back() {
    let (_temp_dir, mut document, source, cache) = setup();
    let compositor = FakeCompositor {
        fail_measure: true,
        ..FakeCompositor::working()
    };

    let outcome = apply_overlay(&mut document, "sunset.png", &source, &cache, "hi", &compositor);

    assert_eq!(outcome.source, OverlaySource::Fallback);
    assert_eq!(outcome.path, source);
    assert!(!outcome.document_changed);
    assert_eq!(compositor.render_calls.get(), 0);
}

#[test]
fn test_unique_cache_path_skips_taken_names() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("sunset_0.png"), b"").unwrap();
    fs::write(temp_dir.path().join("sunset_1.png"), b"").unwrap();

    assert_eq!(
        unique_cache_path(temp_dir.path(), "sunset"),
        temp_dir.path().join("sunset_2.png")
    );
    assert_eq!(
        unique_cache_path(temp_dir.path(), "forest"),
        temp_dir.path().join("forest_0.png")
    );
}

#[test]
fn test_imagemagick_label_arguments() {
    let magick = ImageMagick::default();
    let args = magick.label_args("Back in 5");

    assert!(args.contains(&"label:Back in 5".to_string()));
    assert!(args.contains(&OVERLAY_POINT_SIZE.to_string()));
    assert!(args.contains(&OVERLAY_BORDER.to_string()));
    assert!(args.contains(&OVERLAY_FONT.to_string()));
}

#[test]
fn test_unique_cache_path_reuses_first_gap() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("sunset_1.png"), b"").unwrap();

    assert_eq!(
        unique_cache_path(temp_dir.path(), "sunset"),
        temp_dir.path().join("sunset_0.png")
    );
}
