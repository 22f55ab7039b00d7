use super::*;

use std::path::PathBuf;

//-----------------------------------------------------------------------------

fn create_input(name_part: &str, contents: &str) -> (PathBuf, PathBuf) {
    let dir = utils::temp_dir_name(name_part);
    fs::create_dir_all(&dir).unwrap();
    let input = dir.join("calls.tsv");
    fs::write(&input, contents).unwrap();
    (dir, input)
}

fn fingerprint_of(filename: &Path) -> Fingerprint {
    let fingerprint = Fingerprint::of_file(filename);
    assert!(fingerprint.is_ok(), "Failed to fingerprint the file: {}", fingerprint.unwrap_err());
    fingerprint.unwrap()
}

//-----------------------------------------------------------------------------

#[test]
fn fingerprint_row_count() {
    let (dir, input) = create_input("fingerprint-rows", "header\nrow\nrow\n");
    assert_eq!(fingerprint_of(&input).row_count(), 3, "Wrong row count");
    let _ = fs::remove_dir_all(&dir);

    // The final line counts even without a trailing newline.
    let (dir, input) = create_input("fingerprint-partial", "header\nrow\nrow");
    assert_eq!(fingerprint_of(&input).row_count(), 3, "Wrong row count without a trailing newline");
    let _ = fs::remove_dir_all(&dir);

    let (dir, input) = create_input("fingerprint-empty", "");
    assert_eq!(fingerprint_of(&input).row_count(), 0, "Wrong row count for an empty file");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn fingerprint_digest() {
    let (dir, input) = create_input("fingerprint-digest", "header\nrow\n");
    let first = fingerprint_of(&input);
    let second = fingerprint_of(&input);
    assert_eq!(first, second, "The fingerprint is not deterministic");

    // Same row count, different contents.
    fs::write(&input, "header\nwor\n").unwrap();
    let changed = fingerprint_of(&input);
    assert_eq!(changed.row_count(), first.row_count(), "The row count changed unexpectedly");
    assert_ne!(changed.digest(), first.digest(), "The digest did not change with the contents");
    let _ = fs::remove_dir_all(&dir);
}

//-----------------------------------------------------------------------------

#[test]
fn cache_layout() {
    let fingerprint = Fingerprint::from_parts(42, String::from("0123abcd"));
    let cache = CallCache::new("output", fingerprint);

    let mut root = PathBuf::from("output");
    root.push(CallCache::OUTPUT_DIR);
    root.push("0123abcd");
    assert_eq!(cache.root(), root, "Wrong cache root");
    assert_eq!(cache.data_dir(), root.join(CallCache::DATA_DIR), "Wrong data directory");
    assert_eq!(
        cache.visualization_dir(), root.join(CallCache::VISUALIZATION_DIR),
        "Wrong visualization directory"
    );
    assert_eq!(
        cache.db_file("Y"), root.join(CallCache::DATA_DIR).join("Y.db"),
        "Wrong database file name"
    );
    assert_eq!(
        cache.visualization_file("Y", 10, 250, "txt"),
        root.join(CallCache::VISUALIZATION_DIR).join("Y_10_250_visualization.txt"),
        "Wrong visualization file name"
    );
}

#[test]
fn cache_validity() {
    let (dir, input) = create_input("cache-validity", "header\nrow\nrow\n");
    let fingerprint = fingerprint_of(&input);
    let cache = CallCache::new(&dir, fingerprint.clone());

    // Not valid before the entry exists.
    assert!(!cache.is_valid(), "An absent cache entry is valid");
    assert_eq!(cache.read_metadata(), Ok(None), "Found a metadata record in an absent cache entry");

    // Valid after reset + metadata.
    let result = cache.reset();
    assert!(result.is_ok(), "Failed to reset the cache: {}", result.unwrap_err());
    assert!(!cache.is_valid(), "A cache entry without a metadata record is valid");
    let result = cache.write_metadata();
    assert!(result.is_ok(), "Failed to write the metadata record: {}", result.unwrap_err());
    assert!(cache.is_valid(), "A cache entry with a matching row count is not valid");
    assert_eq!(cache.read_metadata(), Ok(Some(3)), "Wrong persisted row count");

    // Validity is decided by the row count alone.
    let different_count = Fingerprint::from_parts(4, fingerprint.digest().to_string());
    let stale = CallCache::new(&dir, different_count);
    assert_eq!(stale.root(), cache.root(), "Same digest maps to a different cache entry");
    assert!(!stale.is_valid(), "A cache entry with a mismatching row count is valid");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cache_reset_replaces_entry() {
    let (dir, input) = create_input("cache-reset", "header\nrow\n");
    let cache = CallCache::new(&dir, fingerprint_of(&input));

    cache.reset().unwrap();
    cache.write_metadata().unwrap();
    let leftover = cache.data_dir().join("stale.db");
    fs::write(&leftover, "stale").unwrap();

    // A reset must wipe all previous contents.
    cache.reset().unwrap();
    assert!(!utils::file_exists(&leftover), "Reset did not remove a previous database");
    assert!(!cache.is_valid(), "Reset left a valid metadata record behind");
    assert!(utils::file_exists(cache.data_dir()), "Reset did not recreate the data directory");
    assert!(
        utils::file_exists(cache.visualization_dir()),
        "Reset did not recreate the visualization directory"
    );

    let _ = fs::remove_dir_all(&dir);
}

//-----------------------------------------------------------------------------
