// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Clinical entity snapshots kept for offline reads.
//!
//! Records are opaque JSON values: the cache never looks inside them, it only
//! groups them by [`EntityType`] and stamps each group with the time it was
//! written. A write for a type replaces that type's snapshot wholesale.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Entity-type key under which records are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    Patients,
    Appointments,
    Doctors,
    Clinics,
    PatientHealth,
    Payments,
}

impl EntityType {
    /// Every entity type, in display order.
    pub const ALL: [EntityType; 6] = [
        EntityType::Patients,
        EntityType::Appointments,
        EntityType::Doctors,
        EntityType::Clinics,
        EntityType::PatientHealth,
        EntityType::Payments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Patients => "patients",
            EntityType::Appointments => "appointments",
            EntityType::Doctors => "doctors",
            EntityType::Clinics => "clinics",
            EntityType::PatientHealth => "patientHealth",
            EntityType::Payments => "payments",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidEntityType(s.to_string()))
    }
}

/// A partial `entity type → records` map: the unit of a cache write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityBundle {
    sets: BTreeMap<EntityType, Vec<Value>>,
}

impl EntityBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the records for one entity type.
    pub fn with(mut self, entity_type: EntityType, records: Vec<Value>) -> Self {
        self.sets.insert(entity_type, records);
        self
    }

    pub fn insert(&mut self, entity_type: EntityType, records: Vec<Value>) {
        self.sets.insert(entity_type, records);
    }

    /// Entity types covered by this bundle.
    pub fn entity_types(&self) -> Vec<EntityType> {
        self.sets.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityType, &Vec<Value>)> {
        self.sets.iter()
    }

    pub fn into_sets(self) -> BTreeMap<EntityType, Vec<Value>> {
        self.sets
    }
}

/// The cached snapshot for one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEntitySet {
    pub entity_type: EntityType,
    pub records: Vec<Value>,
    pub updated_at: DateTime<Utc>,
}

impl CachedEntitySet {
    pub fn new(entity_type: EntityType, records: Vec<Value>) -> Self {
        Self {
            entity_type,
            records,
            updated_at: Utc::now(),
        }
    }

    /// Age of the snapshot in whole minutes, clamped at zero for clock skew.
    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.updated_at).num_minutes().max(0)
    }
}

/// Record counts per cached entity type.
pub type CacheCounts = BTreeMap<EntityType, u64>;

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
