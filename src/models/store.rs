//! Fingerprint-keyed aggregate stores.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::AggregateRecord;
use crate::utils::fingerprint::Fingerprint;

/// One of the two independent aggregation views of an input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Actor country codes
    Political,
    /// Actor geographic country codes
    Geographic,
}

impl Dimension {
    pub const ALL: [Dimension; 2] = [Dimension::Political, Dimension::Geographic];

    /// Short name used in file names and logs.
    pub fn slug(&self) -> &'static str {
        match self {
            Dimension::Political => "political",
            Dimension::Geographic => "geographic",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Mapping from fingerprint to its aggregate record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateStore {
    records: HashMap<Fingerprint, AggregateRecord>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation under `key`.
    ///
    /// The first observation of a key fixes its year and code pair; later
    /// observations only add to the accumulators.
    pub fn upsert(&mut self, key: Fingerprint, year: &str, code1: &str, code2: &str, scale: f64) {
        debug_assert!(!code1.is_empty() && !code2.is_empty());
        self.records
            .entry(key)
            .or_insert_with(|| AggregateRecord::new(year, code1, code2))
            .absorb(scale);
    }

    /// Fold every record of `source` into this store.
    pub fn merge(&mut self, source: AggregateStore) {
        for (key, record) in source.records {
            match self.records.entry(key) {
                Entry::Occupied(mut slot) => slot.get_mut().merge(&record),
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }
    }

    pub fn get(&self, key: &Fingerprint) -> Option<&AggregateRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &AggregateRecord> {
        self.records.values()
    }

    /// Total number of observations across all records.
    pub fn observation_count(&self) -> u64 {
        self.records.values().map(|r| r.scale_count).sum()
    }
}
