//! Tests for secondary index equality scans
//!
//! These tests verify:
//! - Each distinct value finds exactly its record, with the id from add
//! - Duplicate values are all returned, in id order
//! - String values that prefix other values do not match them
//! - Removes and flushes keep the index in step with the records

use atlasdb::DbError;

use crate::common::{collect_ok, person, setup_people};

#[test]
fn test_equality_scan_finds_middle_age() {
    let (_temp, _db, people) = setup_people();
    let _first = people.add(&person("Ann", "Alpha", 12)).unwrap();
    let second = people.add(&person("Bob", "Beta", 123)).unwrap();
    let _third = people.add(&person("Cat", "Gamma", 1234)).unwrap();

    let found = collect_ok(people.iter_equal("age", 123).unwrap());

    assert_eq!(found.len(), 1);
    let (id, record) = &found[0];
    assert_eq!(*id, second);
    assert_eq!(record.name, "Bob");
    assert_eq!(record.lastname, "Beta");
    assert_eq!(record.age, 123);
}

#[test]
fn test_every_distinct_value_found_once() {
    let (_temp, _db, people) = setup_people();
    let ids: Vec<(i64, u64)> = (-20..20)
        .map(|age| (age, people.add(&person("n", "l", age)).unwrap()))
        .collect();

    for (age, id) in ids {
        let found = collect_ok(people.iter_equal("age", age).unwrap());
        assert_eq!(found.len(), 1, "age {}", age);
        assert_eq!(found[0].0, id);
        assert_eq!(found[0].1.age, age);
    }
}

#[test]
fn test_duplicate_values_all_returned_in_id_order() {
    let (_temp, _db, people) = setup_people();
    let a = people.add(&person("a", "Smith", 40)).unwrap();
    people.add(&person("b", "Jones", 40)).unwrap();
    let c = people.add(&person("c", "Smith", 41)).unwrap();
    let d = people.add(&person("d", "Smith", 40)).unwrap();

    let smiths: Vec<u64> = collect_ok(people.iter_equal("lastname", "Smith").unwrap())
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    assert_eq!(smiths, vec![a, c, d]);
    assert_eq!(people.iter_equal("age", 40).unwrap().count(), 3);
}

#[test]
fn test_string_prefix_does_not_match() {
    let (_temp, _db, people) = setup_people();
    people.add(&person("a", "Ann", 1)).unwrap();
    let exact = people.add(&person("b", "An", 2)).unwrap();
    people.add(&person("c", "Anna", 3)).unwrap();
    people.add(&person("d", "A", 4)).unwrap();

    let found = collect_ok(people.iter_equal("lastname", "An").unwrap());

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, exact);
}

#[test]
fn test_empty_string_value() {
    let (_temp, _db, people) = setup_people();
    let blank = people.add(&person("a", "", 1)).unwrap();
    people.add(&person("b", "x", 2)).unwrap();

    let found = collect_ok(people.iter_equal("lastname", "").unwrap());

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, blank);
}

#[test]
fn test_no_match() {
    let (_temp, _db, people) = setup_people();
    people.add(&person("a", "b", 1)).unwrap();

    assert_eq!(people.iter_equal("age", 2).unwrap().count(), 0);
    assert_eq!(people.iter_equal("lastname", "zzz").unwrap().count(), 0);
}

#[test]
fn test_unknown_index() {
    let (_temp, _db, people) = setup_people();

    let err = people.iter_equal("name", "Ann").err().unwrap();

    assert!(matches!(
        err,
        DbError::UnknownIndex { ref field, .. } if field == "name"
    ));
}

#[test]
fn test_remove_drops_index_entries() {
    let (_temp, _db, people) = setup_people();
    let keep = people.add(&person("a", "Same", 50)).unwrap();
    let gone = people.add(&person("b", "Same", 50)).unwrap();

    people.remove(gone).unwrap();

    let by_age: Vec<u64> = collect_ok(people.iter_equal("age", 50).unwrap())
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    let by_name: Vec<u64> = collect_ok(people.iter_equal("lastname", "Same").unwrap())
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    assert_eq!(by_age, vec![keep]);
    assert_eq!(by_name, vec![keep]);
}

#[test]
fn test_index_spans_flushed_tables() {
    let (_temp, db, people) = setup_people();
    let first = people.add(&person("a", "x", 7)).unwrap();
    db.flush().unwrap();
    let second = people.add(&person("b", "y", 7)).unwrap();
    db.flush().unwrap();
    let third = people.add(&person("c", "z", 7)).unwrap();
    people.remove(second).unwrap();

    let ids: Vec<u64> = collect_ok(people.iter_equal("age", 7).unwrap())
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    assert_eq!(ids, vec![first, third]);
}

#[test]
fn test_negative_and_extreme_values() {
    let (_temp, _db, people) = setup_people();
    let min = people.add(&person("min", "a", i64::MIN)).unwrap();
    let neg = people.add(&person("neg", "a", -1)).unwrap();
    let max = people.add(&person("max", "a", i64::MAX)).unwrap();

    assert_eq!(collect_ok(people.iter_equal("age", i64::MIN).unwrap())[0].0, min);
    assert_eq!(collect_ok(people.iter_equal("age", -1).unwrap())[0].0, neg);
    assert_eq!(collect_ok(people.iter_equal("age", i64::MAX).unwrap())[0].0, max);
}
