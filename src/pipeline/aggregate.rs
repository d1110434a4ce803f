// src/pipeline/aggregate.rs

//! Aggregation step: fold every discovered input into the checkpointed state.

use std::path::PathBuf;

use crate::error::Result;
use crate::models::{AggregationState, BatchReport, Config};
use crate::services::RecordProcessor;
use crate::storage::StateStorage;
use crate::utils::log::{header, sub_item, summary};

use super::discover::discover_inputs;

/// Result of an aggregation run.
#[derive(Debug)]
pub struct AggregateRun {
    pub state: AggregationState,
    pub report: BatchReport,
}

/// Run the aggregation step over the configured data directory.
pub async fn run_aggregate(config: &Config, storage: &dyn StateStorage) -> Result<AggregateRun> {
    header("Aggregating input files");

    let inputs = discover_inputs(&config.paths.data_dir, &config.processing).await?;
    let mut state = storage.load_or_reset().await?;
    let processor = RecordProcessor::new(&config.processing);

    let report = aggregate_inputs(
        &processor,
        storage,
        &mut state,
        &inputs,
        config.processing.checkpoint_interval,
    )
    .await?;

    summary(
        "Aggregation",
        &[
            ("Aggregated", report.completed().to_string()),
            ("Already processed", report.skipped().to_string()),
            ("Failed", report.failed().to_string()),
            ("Political records", state.political.len().to_string()),
            ("Geographic records", state.geographic.len().to_string()),
        ],
    );
    for failure in report.failures() {
        sub_item(&failure.to_string());
    }

    Ok(AggregateRun { state, report })
}

/// Process `inputs` in order, checkpointing every `interval` committed files
/// and once more at the end if anything changed.
///
/// Only a failed checkpoint write aborts the run; per-file failures end up
/// in the report.
pub async fn aggregate_inputs(
    processor: &RecordProcessor,
    storage: &dyn StateStorage,
    state: &mut AggregationState,
    inputs: &[PathBuf],
    interval: usize,
) -> Result<BatchReport> {
    let interval = interval.max(1);
    let mut report = BatchReport::default();
    let mut unsaved = 0;

    for (index, path) in inputs.iter().enumerate() {
        log::debug!("Input {}/{}: {}", index + 1, inputs.len(), path.display());
        let outcome = processor.process_file(state, path).await;
        if outcome.is_completed() {
            unsaved += 1;
            if unsaved >= interval {
                storage.save(state).await?;
                unsaved = 0;
            }
        }
        report.push(outcome);
    }

    if unsaved > 0 {
        storage.save(state).await?;
    }
    Ok(report)
}
