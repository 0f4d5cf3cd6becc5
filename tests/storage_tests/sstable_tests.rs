//! Tests for SSTable implementation
//!
//! These tests verify:
//! - SSTable creation and writing
//! - O(log n) key lookups via in-memory index
//! - Tombstone handling
//! - Iterator over all entries and ranged scans
//! - Min/max key range filtering
//! - Temp-file publishing and file format validation
//! - Data block checksum verified on open

use std::path::PathBuf;

use atlasdb::storage::{SSTable, SSTableBuilder, SSTableReader};
use atlasdb::DbError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_sstable() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.sst");
    (temp_dir, path)
}

/// Create an SSTable with numbered entries
fn create_sstable_with_entries(path: &PathBuf, count: usize) -> SSTable {
    let mut builder = SSTableBuilder::new(path).unwrap();
    // Keys must be added in sorted order
    for i in 0..count {
        let key = format!("key{:05}", i); // Zero-padded for lexicographic order
        let value = format!("value{}", i);
        builder.add(key.as_bytes(), value.as_bytes()).unwrap();
    }
    builder.finish().unwrap()
}

// =============================================================================
// SSTableBuilder Tests
// =============================================================================

#[test]
fn test_builder_empty_sstable() {
    let (_temp, path) = setup_temp_sstable();

    let builder = SSTableBuilder::new(&path).unwrap();
    let sstable = builder.finish().unwrap();

    assert_eq!(sstable.entry_count(), 0);
    assert!(path.exists());
}

#[test]
fn test_builder_single_entry() {
    let (_temp, path) = setup_temp_sstable();

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"mykey", b"myvalue").unwrap();
    let sstable = builder.finish().unwrap();

    assert_eq!(sstable.entry_count(), 1);
    assert_eq!(sstable.min_key, b"mykey");
    assert_eq!(sstable.max_key, b"mykey");
}

#[test]
fn test_builder_tracks_min_max_keys() {
    let (_temp, path) = setup_temp_sstable();

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"apple", b"1").unwrap();
    builder.add(b"banana", b"2").unwrap();
    builder.add(b"cherry", b"3").unwrap();
    let sstable = builder.finish().unwrap();

    assert_eq!(sstable.min_key, b"apple");
    assert_eq!(sstable.max_key, b"cherry");
}

#[test]
fn test_builder_with_tombstone() {
    let (_temp, path) = setup_temp_sstable();

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"key1", b"value1").unwrap();
    builder.add_tombstone(b"key2").unwrap();
    builder.add(b"key3", b"value3").unwrap();
    let sstable = builder.finish().unwrap();

    assert_eq!(sstable.entry_count(), 3);
}

// =============================================================================
// SSTableReader Tests - Lookups
// =============================================================================

#[test]
fn test_reader_get_existing_key() {
    let (_temp, path) = setup_temp_sstable();

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"hello", b"world").unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();
    let value = reader.get(b"hello").unwrap();

    assert_eq!(value, Some(b"world".to_vec()));
}

#[test]
fn test_reader_get_nonexistent_key() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 5);

    let reader = SSTableReader::open(&path).unwrap();
    let result = reader.get(b"nonexistent");

    assert!(matches!(result, Err(DbError::KeyNotFound)));
}

#[test]
fn test_reader_get_tombstone() {
    let (_temp, path) = setup_temp_sstable();

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"key1", b"value1").unwrap();
    builder.add_tombstone(b"key2").unwrap();
    builder.add(b"key3", b"value3").unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();

    // Tombstone returns Ok(None), not an error
    let result = reader.get(b"key2").unwrap();
    assert_eq!(result, None);

    // Other keys work normally
    assert_eq!(reader.get(b"key1").unwrap(), Some(b"value1".to_vec()));
    assert_eq!(reader.get(b"key3").unwrap(), Some(b"value3".to_vec()));
}

#[test]
fn test_reader_random_access() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 50);

    let reader = SSTableReader::open(&path).unwrap();

    // Access keys out of order (proves O(log n) index works, not sequential scan)
    let keys = [45, 10, 30, 5, 49, 0, 25];
    for i in keys {
        let key = format!("key{:05}", i);
        let result = reader.get(key.as_bytes());
        assert!(result.is_ok(), "Failed to get key{:05}", i);
    }
}

// =============================================================================
// SSTableReader Tests - Iterator
// =============================================================================

#[test]
fn test_iterator_empty_sstable() {
    let (_temp, path) = setup_temp_sstable();

    let builder = SSTableBuilder::new(&path).unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();
    let entries: Vec<_> = reader.iter().unwrap().collect();

    assert_eq!(entries.len(), 0);
}

#[test]
fn test_iterator_returns_all_entries() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 10);

    let reader = SSTableReader::open(&path).unwrap();
    let entries: Vec<_> = reader.iter().unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(entries.len(), 10);

    // Verify sorted order
    for (i, (key, value)) in entries.iter().enumerate() {
        let expected_key = format!("key{:05}", i);
        let expected_value = format!("value{}", i);
        assert_eq!(key, expected_key.as_bytes());
        assert_eq!(value.as_ref().unwrap(), expected_value.as_bytes());
    }
}

#[test]
fn test_iterator_includes_tombstones() {
    let (_temp, path) = setup_temp_sstable();

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"a", b"1").unwrap();
    builder.add_tombstone(b"b").unwrap();
    builder.add(b"c", b"3").unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();
    let entries: Vec<_> = reader.iter().unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0], (b"a".to_vec(), Some(b"1".to_vec())));
    assert_eq!(entries[1], (b"b".to_vec(), None)); // Tombstone
    assert_eq!(entries[2], (b"c".to_vec(), Some(b"3".to_vec())));
}

// =============================================================================
// SSTable Metadata Tests
// =============================================================================

#[test]
fn test_might_contain_out_of_range() {
    let (_temp, path) = setup_temp_sstable();

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"banana", b"1").unwrap();
    builder.add(b"cherry", b"2").unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();

    assert!(!reader.might_contain(b"apple"));
    assert!(!reader.might_contain(b"date"));
    assert!(matches!(reader.get(b"apple"), Err(DbError::KeyNotFound)));
    assert!(matches!(reader.get(b"date"), Err(DbError::KeyNotFound)));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_open_nonexistent_file() {
    let (_temp, path) = setup_temp_sstable();
    // Don't create the file

    let result = SSTableReader::open(&path);
    assert!(result.is_err());
}

#[test]
fn test_open_invalid_magic() {
    let (_temp, path) = setup_temp_sstable();

    // Write garbage to file
    std::fs::write(&path, b"GARBAGE_DATA_NOT_SSTABLE").unwrap();

    let result = SSTableReader::open(&path);
    assert!(matches!(result, Err(DbError::Storage(_))));
}

#[test]
fn test_open_detects_flipped_data_byte() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 10);

    // Header (14) + lengths (8) + "key00000" (8) lands on the first value
    let mut bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[30..35], b"value");
    bytes[30] ^= 0x20;
    std::fs::write(&path, &bytes).unwrap();

    let result = SSTableReader::open(&path);
    assert!(matches!(result, Err(DbError::Storage(msg)) if msg.contains("checksum")));
}

#[test]
fn test_open_detects_wrong_stored_checksum() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 3);

    // Footer: index offset (8), data CRC (4), padding (4)
    let mut bytes = std::fs::read(&path).unwrap();
    let crc_at = bytes.len() - 8;
    bytes[crc_at] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(SSTableReader::open(&path), Err(DbError::Storage(_))));
}

#[test]
fn test_builder_rejects_unsorted_keys() {
    let (_temp, path) = setup_temp_sstable();

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"b", b"1").unwrap();

    assert!(matches!(builder.add(b"a", b"2"), Err(DbError::Storage(_))));
    assert!(matches!(builder.add(b"b", b"3"), Err(DbError::Storage(_))));
}

#[test]
fn test_unfinished_builder_publishes_nothing() {
    let (_temp, path) = setup_temp_sstable();

    {
        let mut builder = SSTableBuilder::new(&path).unwrap();
        builder.add(b"key", b"value").unwrap();
    }

    assert!(!path.exists());
    assert!(path.with_extension("tmp").exists());
}

// =============================================================================
// Ranged Scan Tests
// =============================================================================

#[test]
fn test_scan_from_existing_key() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 10);

    let reader = SSTableReader::open(&path).unwrap();
    let keys: Vec<Vec<u8>> = reader
        .scan_from(b"key00007")
        .unwrap()
        .map(|r| r.unwrap().0)
        .collect();

    assert_eq!(
        keys,
        vec![b"key00007".to_vec(), b"key00008".to_vec(), b"key00009".to_vec()]
    );
}

#[test]
fn test_scan_from_between_keys() {
    let (_temp, path) = setup_temp_sstable();

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"apple", b"1").unwrap();
    builder.add_tombstone(b"banana").unwrap();
    builder.add(b"cherry", b"3").unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();
    let entries: Vec<_> = reader.scan_from(b"b").unwrap().map(|r| r.unwrap()).collect();

    assert_eq!(entries[0], (b"banana".to_vec(), None));
    assert_eq!(entries[1], (b"cherry".to_vec(), Some(b"3".to_vec())));
    assert_eq!(entries.len(), 2);
}

#[test]
fn test_scan_from_past_end() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 3);

    let reader = SSTableReader::open(&path).unwrap();

    assert_eq!(reader.scan_from(b"zzz").unwrap().count(), 0);
}

#[test]
fn test_independent_scans_and_lookups() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 20);

    let reader = SSTableReader::open(&path).unwrap();
    let mut first = reader.iter().unwrap();
    let mut second = reader.scan_from(b"key00010").unwrap();

    assert_eq!(first.next().unwrap().unwrap().0, b"key00000");
    assert_eq!(reader.get(b"key00015").unwrap(), Some(b"value15".to_vec()));
    assert_eq!(second.next().unwrap().unwrap().0, b"key00010");
    assert_eq!(first.next().unwrap().unwrap().0, b"key00001");
}

#[test]
fn test_reader_min_max_keys() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 4);

    let reader = SSTableReader::open(&path).unwrap();

    assert_eq!(reader.min_key(), Some(b"key00000".as_slice()));
    assert_eq!(reader.max_key(), Some(b"key00003".as_slice()));
    assert_eq!(reader.path(), path.as_path());
}
