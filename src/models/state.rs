//! Aggregation context shared by the processor and the checkpoint store.

use uuid::Uuid;

use crate::models::{AggregateStore, Dimension, ProcessedInputRegistry};
use crate::utils::fingerprint::FingerprintHasher;

/// Everything a run accumulates: both resident stores, the registry of
/// consumed inputs and the hasher whose key space the stores use.
///
/// Owned by the pipeline driver and lent to one mutator at a time.
#[derive(Debug, Clone)]
pub struct AggregationState {
    hasher: FingerprintHasher,
    pub political: AggregateStore,
    pub geographic: AggregateStore,
    pub registry: ProcessedInputRegistry,
}

impl AggregationState {
    /// Empty state with a fresh random key space.
    pub fn new() -> Self {
        Self::with_seed(Uuid::new_v4())
    }

    /// Empty state using the key space of `seed`.
    pub fn with_seed(seed: Uuid) -> Self {
        Self::from_parts(
            seed,
            AggregateStore::new(),
            AggregateStore::new(),
            ProcessedInputRegistry::new(),
        )
    }

    /// Rebuild a state from persisted parts.
    pub fn from_parts(
        seed: Uuid,
        political: AggregateStore,
        geographic: AggregateStore,
        registry: ProcessedInputRegistry,
    ) -> Self {
        Self {
            hasher: FingerprintHasher::new(seed),
            political,
            geographic,
            registry,
        }
    }

    pub fn seed(&self) -> Uuid {
        self.hasher.seed()
    }

    pub fn hasher(&self) -> &FingerprintHasher {
        &self.hasher
    }

    pub fn store(&self, dimension: Dimension) -> &AggregateStore {
        match dimension {
            Dimension::Political => &self.political,
            Dimension::Geographic => &self.geographic,
        }
    }
}

impl Default for AggregationState {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for AggregationState {
    fn eq(&self, other: &Self) -> bool {
        self.seed() == other.seed()
            && self.political == other.political
            && self.geographic == other.geographic
            && self.registry == other.registry
    }
}
