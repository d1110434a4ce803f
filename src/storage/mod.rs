//! Checkpoint persistence for aggregation state.
//!
//! A checkpoint is a generation of three artifacts plus a manifest that
//! points at them. Readers only ever follow the manifest, and the manifest
//! is replaced last, so a save interrupted at any point leaves the previous
//! generation readable.
//!
//! ## Directory Structure
//!
//! ```text
//! checkpoint/
//! ├── manifest.json          # generation, seed, artifact names
//! ├── political.7.json       # AggregateStore, political dimension
//! ├── geographic.7.json      # AggregateStore, geographic dimension
//! └── registry.7.json        # processed input file names
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::AggregationState;

// Re-export for convenience
pub use local::CheckpointManager;

/// Current on-disk layout version.
pub const FORMAT_VERSION: u32 = 1;

/// Artifact name stems.
pub const POLITICAL_STEM: &str = "political";
pub const GEOGRAPHIC_STEM: &str = "geographic";
pub const REGISTRY_STEM: &str = "registry";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Pointer to the current checkpoint generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub generation: u64,
    /// Fingerprint seed the stores are keyed with
    pub seed: Uuid,
    pub saved_at: DateTime<Utc>,
    pub political: String,
    pub geographic: String,
    pub registry: String,
    pub political_records: usize,
    pub geographic_records: usize,
    pub processed_files: usize,
}

impl Manifest {
    /// Manifest describing `state` saved as `generation`.
    pub fn for_state(state: &AggregationState, generation: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            generation,
            seed: state.seed(),
            saved_at: Utc::now(),
            political: artifact_name(POLITICAL_STEM, generation),
            geographic: artifact_name(GEOGRAPHIC_STEM, generation),
            registry: artifact_name(REGISTRY_STEM, generation),
            political_records: state.political.len(),
            geographic_records: state.geographic.len(),
            processed_files: state.registry.len(),
        }
    }

    /// File names of the three artifacts of this generation.
    pub fn artifacts(&self) -> [&str; 3] {
        [&self.political, &self.geographic, &self.registry]
    }
}

/// File name of an artifact in a given generation.
pub fn artifact_name(stem: &str, generation: u64) -> String {
    format!("{stem}.{generation}.json")
}

/// Metadata about a checkpoint write.
#[derive(Debug, Clone)]
pub struct SaveMetadata {
    pub generation: u64,
    pub political_records: usize,
    pub geographic_records: usize,
    pub processed_files: usize,
    pub timestamp: DateTime<Utc>,
}

impl From<&Manifest> for SaveMetadata {
    fn from(manifest: &Manifest) -> Self {
        Self {
            generation: manifest.generation,
            political_records: manifest.political_records,
            geographic_records: manifest.geographic_records,
            processed_files: manifest.processed_files,
            timestamp: manifest.saved_at,
        }
    }
}

/// Trait for checkpoint storage backends.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Persist both stores and the registry as one generation.
    async fn save(&self, state: &AggregationState) -> Result<SaveMetadata>;

    /// Load the current generation, `None` when nothing was saved yet.
    async fn load(&self) -> Result<Option<AggregationState>>;

    /// Remove every checkpoint artifact.
    async fn clear(&self) -> Result<()>;

    /// Read the current manifest without loading the stores.
    async fn manifest(&self) -> Result<Option<Manifest>>;

    /// Load the checkpoint, starting over from empty state if it is corrupt.
    ///
    /// Corruption discards all saved progress; the warning is the only trace.
    async fn load_or_reset(&self) -> Result<AggregationState> {
        match self.load().await {
            Ok(Some(state)) => {
                log::info!(
                    "Resuming from checkpoint: {} processed files, {} political / {} geographic records",
                    state.registry.len(),
                    state.political.len(),
                    state.geographic.len()
                );
                Ok(state)
            }
            Ok(None) => {
                log::info!("No checkpoint found, starting from empty state");
                Ok(AggregationState::new())
            }
            Err(e) if e.is_corruption() => {
                log::warn!("Checkpoint unreadable ({}), discarding saved progress", e);
                self.clear().await?;
                Ok(AggregationState::new())
            }
            Err(e) => Err(e),
        }
    }
}
