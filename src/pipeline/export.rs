// src/pipeline/export.rs

//! Export step.

use std::path::Path;

use crate::error::Result;
use crate::models::{AggregationState, Config};
use crate::services::Exporter;
use crate::services::exporter::ExportedFile;
use crate::storage::StateStorage;
use crate::utils::log::{header, sub_item};

/// Export the checkpointed state to `output_base`.
///
/// A corrupt checkpoint is an error here; only the aggregation step may
/// discard saved progress.
pub async fn run_export(
    config: &Config,
    storage: &dyn StateStorage,
    output_base: &Path,
) -> Result<Vec<ExportedFile>> {
    let state = match storage.load().await? {
        Some(state) => state,
        None => {
            log::warn!("No checkpoint found, exporting empty results");
            AggregationState::new()
        }
    };
    export_state(config, &state, output_base).await
}

/// Export an in-memory state to `output_base`.
pub async fn export_state(
    config: &Config,
    state: &AggregationState,
    output_base: &Path,
) -> Result<Vec<ExportedFile>> {
    header("Exporting results");

    let files = Exporter::new(&config.export).export(state, output_base).await?;
    for file in &files {
        sub_item(&format!("{}: {} rows", file.path.display(), file.rows));
    }
    Ok(files)
}
