// Copyright 2025 Eric Jingryd (tidynest@proton.me)
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

use super::super::*;
use std::fs;
use tempfile::TempDir;

use crate::core::{parse_timestamp, HistoryDocument, ImageRecord, OverlaySize};

const VALID_HISTORY: &str = r#"{
    "penalty-weight-multiplier": -1,
    "frequency-weight-multiplier": 1,
    "new-image-weight-advantage": 1,
    "base_path": "~/Pictures/",
    "images": {
        "a.png": {"last-access": "2024-01-01 10:00:00", "penalty-weight": 0, "omit": false}
    }
}"#;

/// Helper: Creates a temporary history file with the given content.
fn create_test_history(content: &str) -> (TempDir, HistoryStore) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sleep_history.json");
    fs::write(&path, content).unwrap();
    (temp_dir, HistoryStore::new(path))
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_valid_history() {
    let (_temp_dir, store) = create_test_history(VALID_HISTORY);

    let document = store.load().unwrap();
    assert_eq!(document.images.len(), 1);
    assert_eq!(
        document.images["a.png"].last_access,
        parse_timestamp("2024-01-01 10:00:00").unwrap()
    );
}

#[test]
fn test_load_missing_file_creates_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("sleep_history.json");
    let store = HistoryStore::new(path.clone());

    let document = store.load().unwrap();
    assert_eq!(document, HistoryDocument::default());
    assert!(path.exists(), "Default history should be persisted");

    // And it loads back as the same thing
    assert_eq!(store.load().unwrap(), document);
}

#[test]
fn test_missing_top_level_key() {
    let content = VALID_HISTORY.replace("\"base_path\": \"~/Pictures/\",", "");
    let (_temp_dir, store) = create_test_history(&content);

    match store.load().unwrap_err() {
        HistoryError::MissingKey(key) => assert_eq!(key, "base_path"),
        other => panic!("Expected MissingKey, got: {:?}", other),
    }
}

#[test]
fn test_missing_image_key_names_image() {
    let content = VALID_HISTORY.replace(", \"omit\": false", "");
    let (_temp_dir, store) = create_test_history(&content);

    match store.load().unwrap_err() {
        HistoryError::MissingImageKey { image, key } => {
            assert_eq!(image, "a.png");
            assert_eq!(key, "omit");
        }
        other => panic!("Expected MissingImageKey, got: {:?}", other),
    }
}

#[test]
fn test_bad_timestamp() {
    let content = VALID_HISTORY.replace("2024-01-01 10:00:00", "2024-01-01T10:00");
    let (_temp_dir, store) = create_test_history(&content);

    match store.load().unwrap_err() {
        HistoryError::BadTimestamp { image, value } => {
            assert_eq!(image, "a.png");
            assert_eq!(value, "2024-01-01T10:00");
        }
        other => panic!("Expected BadTimestamp, got: {:?}", other),
    }
}

#[test]
fn test_syntax_error_reports_line() {
    let (_temp_dir, store) = create_test_history("{\n  \"images\": {,\n}");

    match store.load().unwrap_err() {
        HistoryError::Syntax { line, .. } => assert_eq!(line, 2),
        other => panic!("Expected Syntax, got: {:?}", other),
    }
}

#[test]
fn test_wrong_value_type() {
    let content = VALID_HISTORY.replace("\"penalty-weight\": 0", "\"penalty-weight\": \"high\"");
    let (_temp_dir, store) = create_test_history(&content);

    assert!(matches!(store.load(), Err(HistoryError::InvalidValue(_))));
}

#[test]
fn test_failed_load_leaves_file_untouched() {
    let content = VALID_HISTORY.replace(", \"omit\": false", "");
    let (_temp_dir, store) = create_test_history(&content);

    assert!(store.load().is_err());
    assert_eq!(fs::read_to_string(store.path()).unwrap(), content);
}

// ============================================================================
// Saving
// ============================================================================

#[test]
fn test_round_trip_preserves_content() {
    let temp_dir = TempDir::new().unwrap();
    let store = HistoryStore::new(temp_dir.path().join("sleep_history.json"));

    let mut document = HistoryDocument::default();
    document.policy.penalty_weight_multiplier = -3;
    document.policy.frequency_weight_multiplier = 2.5;

    let mut special = ImageRecord::new(parse_timestamp("2023-12-31 23:59:59").unwrap());
    special.penalty_weight = 7;
    special.omit = true;
    special
        .overlay_maps
        .insert("Back at 5 \"sharp\"".to_string(), "/cache/été_0.png".into());
    document
        .images
        .insert("Été à la plage, \"nuit\" (1) #2.png".to_string(), special);
    document
        .images
        .insert("plain.png".to_string(), ImageRecord::new(parse_timestamp("2024-02-29 00:00:01").unwrap()));
    document.overlay_sizes.insert(
        "Back at 5 \"sharp\"".to_string(),
        OverlaySize { width: 512, height: 96 },
    );

    store.save(&document).unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(loaded, document);
}

#[test]
fn test_save_keeps_in_memory_timestamps() {
    let temp_dir = TempDir::new().unwrap();
    let store = HistoryStore::new(temp_dir.path().join("sleep_history.json"));

    let when = parse_timestamp("2024-06-01 08:30:00").unwrap();
    let mut document = HistoryDocument::default();
    document.images.insert("a.png".to_string(), ImageRecord::new(when));

    store.save(&document).unwrap();
    store.save(&document).unwrap();

    assert_eq!(document.images["a.png"].last_access, when);
    let raw = fs::read_to_string(store.path()).unwrap();
    assert!(raw.contains("\"last-access\": \"2024-06-01 08:30:00\""));
}

// ============================================================================
// Init and backups
// ============================================================================

#[test]
fn test_init_backs_up_existing_history() {
    let (temp_dir, store) = create_test_history(VALID_HISTORY);

    let document = store.init().unwrap();
    assert!(document.images.is_empty());
    assert!(store.load().unwrap().images.is_empty());

    let backups: Vec<_> = fs::read_dir(temp_dir.path().join("backups"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(fs::read_to_string(&backups[0]).unwrap(), VALID_HISTORY);

    // Backup name: sleep_history.json.YYYY-MM-DD_HHMMSS
    let name = backups[0].file_name().unwrap().to_str().unwrap().to_string();
    let timestamp = name.trim_start_matches("sleep_history.json.");
    assert!(
        chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d_%H%M%S").is_ok(),
        "Unexpected backup name {}",
        name
    );
}

#[test]
fn test_init_without_existing_history() {
    let temp_dir = TempDir::new().unwrap();
    let store = HistoryStore::new(temp_dir.path().join("sleep_history.json"));

    store.init().unwrap();

    assert!(store.path().exists());
    assert!(!temp_dir.path().join("backups").exists());
}

#[test]
fn test_expand_path_tilde() {
    let expanded = expand_path("~/Pictures");
    assert!(!expanded.starts_with("~"));
    assert!(expanded.ends_with("Pictures"));

    assert_eq!(expand_path("/abs/path"), std::path::PathBuf::from("/abs/path"));
}
