// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

#[parameterized(
    patients = { "patients", EntityType::Patients },
    patient_health = { "patientHealth", EntityType::PatientHealth },
    case_insensitive = { "PAYMENTS", EntityType::Payments },
)]
fn entity_type_from_str(input: &str, expected: EntityType) {
    assert_eq!(input.parse::<EntityType>().unwrap(), expected);
}

#[test]
fn entity_type_rejects_unknown() {
    let err = "nurses".parse::<EntityType>().unwrap_err();
    assert!(matches!(err, Error::InvalidEntityType(_)));
}

#[test]
fn entity_type_serializes_as_camel_case() {
    assert_eq!(
        serde_json::to_string(&EntityType::PatientHealth).unwrap(),
        "\"patientHealth\""
    );
}

#[test]
fn bundle_serializes_as_plain_map() {
    let bundle = EntityBundle::new()
        .with(EntityType::Patients, vec![json!({"id": 1}), json!({"id": 2})])
        .with(EntityType::Clinics, vec![]);

    let value = serde_json::to_value(&bundle).unwrap();
    assert_eq!(
        value,
        json!({"patients": [{"id": 1}, {"id": 2}], "clinics": []})
    );

    let parsed: EntityBundle = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, bundle);
}

#[test]
fn bundle_with_replaces_same_type() {
    let bundle = EntityBundle::new()
        .with(EntityType::Doctors, vec![json!("a")])
        .with(EntityType::Doctors, vec![json!("b"), json!("c")]);

    let sets = bundle.into_sets();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[&EntityType::Doctors].len(), 2);
}

#[test]
fn cached_set_age_is_never_negative() {
    let mut set = CachedEntitySet::new(EntityType::Patients, vec![]);
    set.updated_at = Utc::now() + chrono::Duration::minutes(5);
    assert_eq!(set.age_minutes(), 0);
}
