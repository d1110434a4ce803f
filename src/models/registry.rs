//! Registry of fully aggregated input files.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Names of input files whose rows are already part of the resident stores.
///
/// Entries are only ever added during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessedInputRegistry {
    files: BTreeSet<String>,
}

impl ProcessedInputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.files.contains(file_name)
    }

    /// Mark a file as processed. Returns `false` if it already was.
    pub fn insert(&mut self, file_name: impl Into<String>) -> bool {
        self.files.insert(file_name.into())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }
}
