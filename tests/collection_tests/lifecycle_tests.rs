//! Tests for the database lifecycle
//!
//! These tests verify:
//! - Operations fail with Closed once the database is closed
//! - Records, indexes and the id allocator persist across reopen
//! - Unflushed writes are recovered from the WAL
//! - Concurrent writers get distinct ids
//! - An add stays committed when the flush it triggers fails
//! - A collection keeps the index set it was created with

use std::fs;
use std::sync::Arc;
use std::thread;

use atlasdb::config::WalSyncStrategy;
use atlasdb::{Codec, Config, Database, DbError, Schema};
use tempfile::TempDir;

use crate::common::{collect_ok, open_db, person, person_schema, Person};

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_add_after_close_fails() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());
    let people = db.collection(person_schema(), Codec::json()).unwrap();

    db.close().unwrap();

    assert!(db.is_closed());
    assert!(matches!(
        people.add(&person("a", "b", 1)),
        Err(DbError::Closed)
    ));
    assert!(matches!(people.get(1), Err(DbError::Closed)));
    assert!(matches!(people.iter_all().err(), Some(DbError::Closed)));
    assert!(matches!(people.len(), Err(DbError::Closed)));
    assert!(matches!(db.flush(), Err(DbError::Closed)));
    assert!(matches!(
        db.collection(person_schema(), Codec::json()).err(),
        Some(DbError::Closed)
    ));
}

#[test]
fn test_double_close_fails() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    db.close().unwrap();

    assert!(matches!(db.close(), Err(DbError::Closed)));
}

#[test]
fn test_close_is_shared_by_clones() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());
    let clone = db.clone();

    clone.close().unwrap();

    assert!(db.is_closed());
    assert!(format!("{:?}", db).contains("closed: true"));
}

#[test]
fn test_open_creates_missing_directory() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("store");

    let db = Database::open_path(&path).unwrap();

    assert!(path.join("wal.log").exists());
    assert_eq!(db.data_dir(), path.as_path());
    db.close().unwrap();
}

#[test]
fn test_open_fails_on_file_location() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("plain_file");
    std::fs::write(&path, b"not a directory").unwrap();

    let err = Database::open_path(&path).unwrap_err();

    assert!(err.is_storage_io());
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_reopen_keeps_records_indexes_and_ids() {
    let temp = TempDir::new().unwrap();
    let (first, second) = {
        let db = open_db(temp.path());
        let people = db.collection(person_schema(), Codec::json()).unwrap();
        let first = people.add(&person("Ann", "Alpha", 30)).unwrap();
        let second = people.add(&person("Bob", "Beta", 31)).unwrap();
        db.close().unwrap();
        (first, second)
    };

    let db = open_db(temp.path());
    let people = db.collection(person_schema(), Codec::json()).unwrap();

    assert_eq!(people.get(first).unwrap().name, "Ann");
    let found = collect_ok(people.iter_equal("lastname", "Beta").unwrap());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, second);

    let third = people.add(&person("Cat", "Gamma", 32)).unwrap();
    assert!(third > second);
}

#[test]
fn test_unflushed_writes_recovered_from_wal() {
    let temp = TempDir::new().unwrap();
    let (kept, removed) = {
        let db = open_db(temp.path());
        let people = db.collection(person_schema(), Codec::json()).unwrap();
        let kept = people.add(&person("a", "b", 1)).unwrap();
        let removed = people.add(&person("c", "d", 2)).unwrap();
        people.remove(removed).unwrap();
        // Dropped without close
        (kept, removed)
    };

    let db = open_db(temp.path());
    let people = db.collection(person_schema(), Codec::json()).unwrap();

    assert!(people.contains(kept).unwrap());
    assert!(!people.contains(removed).unwrap());
    assert_eq!(people.iter_equal("age", 2).unwrap().count(), 0);
    assert!(people.add(&person("e", "f", 3)).unwrap() > removed);
}

#[test]
fn test_add_is_committed_when_triggered_flush_fails() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .memtable_size_limit(1)
        .build();
    let db = Database::open(config.clone()).unwrap();
    let people = db.collection(person_schema(), Codec::json()).unwrap();

    let sstables = temp.path().join("sstables");
    let aside = temp.path().join("sstables_aside");
    fs::rename(&sstables, &aside).unwrap();
    fs::write(&sstables, b"in the way").unwrap();

    let first = people.add(&person("Ann", "Alpha", 30)).unwrap();
    let second = people.add(&person("Bob", "Beta", 31)).unwrap();

    assert!(second > first);
    assert_eq!(people.get(first).unwrap().name, "Ann");
    assert_eq!(people.len().unwrap(), 2);
    assert_eq!(people.iter_equal("age", 30).unwrap().count(), 1);

    fs::remove_file(&sstables).unwrap();
    fs::rename(&aside, &sstables).unwrap();
    db.flush().unwrap();
    db.close().unwrap();

    let db = Database::open(config).unwrap();
    let people = db.collection(person_schema(), Codec::json()).unwrap();
    assert_eq!(people.len().unwrap(), 2);
    assert_eq!(people.get(second).unwrap().lastname, "Beta");
    assert!(people.add(&person("Cat", "Gamma", 32)).unwrap() > second);
}

// =============================================================================
// Schema Tests
// =============================================================================

#[test]
fn test_same_schema_reopens() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());
    let people = db.collection(person_schema(), Codec::json()).unwrap();
    people.add(&person("Ann", "Alpha", 30)).unwrap();

    // Declaration order does not matter
    let reordered = Schema::new("person")
        .index("lastname", |p: &Person| p.lastname.clone())
        .index("age", |p: &Person| p.age);
    let again = db.collection(reordered, Codec::json()).unwrap();

    assert_eq!(again.iter_equal("age", 30).unwrap().count(), 1);
}

#[test]
fn test_handle_without_indexes_is_refused() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());
    let people = db.collection(person_schema(), Codec::json()).unwrap();
    people.add(&person("Ann", "Alpha", 30)).unwrap();

    let bare = db.collection(Schema::<Person>::new("person"), Codec::json());

    assert!(matches!(bare.err(), Some(DbError::Config(msg)) if msg.contains("person")));
    // Nothing written behind the index's back
    assert_eq!(people.len().unwrap(), 1);
}

#[test]
fn test_changed_index_set_is_refused_after_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let db = open_db(temp.path());
        let people = db.collection(person_schema(), Codec::json()).unwrap();
        people.add(&person("Ann", "Alpha", 30)).unwrap();
        db.close().unwrap();
    }

    let db = open_db(temp.path());
    let fewer = Schema::new("person").index("age", |p: &Person| p.age);
    let more = person_schema().index("name", |p: &Person| p.name.clone());

    assert!(matches!(
        db.collection(fewer, Codec::json()).err(),
        Some(DbError::Config(_))
    ));
    assert!(matches!(
        db.collection(more, Codec::json()).err(),
        Some(DbError::Config(_))
    ));
    assert!(db.collection(person_schema(), Codec::json()).is_ok());
}

#[test]
fn test_collections_keep_separate_index_sets() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());

    db.collection(person_schema(), Codec::json()).unwrap();
    let staff = Schema::new("staff").index("name", |p: &Person| p.name.clone());

    assert!(db.collection(staff, Codec::json()).is_ok());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_adds_get_distinct_ids() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());
    let people = db.collection(person_schema(), Codec::json()).unwrap();

    let mut handles = Vec::new();
    for t in 0..4 {
        let people = people.clone();
        handles.push(thread::spawn(move || {
            (0..25)
                .map(|i| people.add(&person("t", &format!("thread{}", t), i)).unwrap())
                .collect::<Vec<u64>>()
        }));
    }

    let mut ids: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort_unstable();
    ids.dedup();

    assert_eq!(ids.len(), 100);
    assert_eq!(people.len().unwrap(), 100);
    assert_eq!(people.iter_equal("lastname", "thread2").unwrap().count(), 25);
}

#[test]
fn test_readers_during_close() {
    let temp = TempDir::new().unwrap();
    let db = open_db(temp.path());
    let people: Arc<atlasdb::Collection<Person>> =
        Arc::new(db.collection(person_schema(), Codec::json()).unwrap());
    let id = people.add(&person("a", "b", 1)).unwrap();

    let reader = {
        let people = Arc::clone(&people);
        thread::spawn(move || {
            for _ in 0..500 {
                match people.get(id) {
                    Ok(p) => assert_eq!(p.name, "a"),
                    Err(DbError::Closed) => return,
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
        })
    };

    db.close().unwrap();
    reader.join().unwrap();
}

#[test]
fn test_open_without_create_if_missing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent");
    let config = atlasdb::Config::builder()
        .data_dir(&path)
        .create_if_missing(false)
        .build();

    assert!(matches!(Database::open(config), Err(DbError::Config(_))));
    assert!(!path.exists());
}
