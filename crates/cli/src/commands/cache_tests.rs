// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use ck_ipc::EntityType;
use tempfile::TempDir;

#[test]
fn format_counts_lists_each_type() {
    let mut counts = CacheCounts::new();
    counts.insert(EntityType::Patients, 12);
    counts.insert(EntityType::Payments, 0);

    assert_eq!(
        format_counts(&counts),
        vec!["patients       12".to_string(), "payments       0".to_string()]
    );
}

#[test]
fn format_counts_empty_cache() {
    assert_eq!(format_counts(&CacheCounts::new()), vec!["Cache is empty."]);
}

#[test]
fn read_records_accepts_array() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("patients.json");
    fs::write(&file, r#"[{"id":1},{"id":2}]"#).unwrap();

    let records = read_records(&file).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["id"], 2);
}

#[test]
fn read_records_rejects_object() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("patients.json");
    fs::write(&file, r#"{"id":1}"#).unwrap();

    assert!(matches!(read_records(&file), Err(Error::InvalidInput(_))));
}

#[test]
fn read_records_reports_bad_json() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("patients.json");
    fs::write(&file, "[{").unwrap();

    assert!(matches!(read_records(&file), Err(Error::Json(_))));
}
