//! Per-file aggregation driver.
//!
//! A file is aggregated into file-local stores first. Only a file that was
//! read to the end is merged into the resident stores and recorded in the
//! registry, so a failed or timed-out file contributes nothing and is picked
//! up again by a later run.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{
    AggregateStore, AggregationState, ColumnSchema, Dimension, FileOutcome, ProcessingConfig,
};
use crate::services::parser::{EventReader, RowResult};
use crate::utils::fingerprint::FingerprintHasher;

/// Aggregates of a single input file.
#[derive(Debug, Default)]
pub struct PartialAggregate {
    pub political: AggregateStore,
    pub geographic: AggregateStore,
    pub rows_read: u64,
    pub rows_dropped: u64,
}

impl PartialAggregate {
    fn store_mut(&mut self, dimension: Dimension) -> &mut AggregateStore {
        match dimension {
            Dimension::Political => &mut self.political,
            Dimension::Geographic => &mut self.geographic,
        }
    }
}

/// Drives one input file at a time into the resident state.
#[derive(Debug, Clone)]
pub struct RecordProcessor {
    schema: ColumnSchema,
    file_timeout: Duration,
}

impl RecordProcessor {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self::with_timeout(config.columns.clone(), config.file_timeout())
    }

    pub fn with_timeout(schema: ColumnSchema, file_timeout: Duration) -> Self {
        Self {
            schema,
            file_timeout,
        }
    }

    /// Aggregate one file into `state`, unless the registry already lists it.
    pub async fn process_file(&self, state: &mut AggregationState, path: &Path) -> FileOutcome {
        let file_name = file_name_of(path);
        if state.registry.contains(&file_name) {
            log::debug!("Skipping {}: already processed", file_name);
            return FileOutcome::skipped(file_name);
        }

        log::info!("Aggregating {}", file_name);
        match self.aggregate_file(state.hasher().clone(), path).await {
            Ok(partial) => {
                let political = partial.political.len();
                let geographic = partial.geographic.len();
                state.political.merge(partial.political);
                state.geographic.merge(partial.geographic);
                state.registry.insert(file_name.clone());
                log::info!(
                    "Aggregated {}: {} rows ({} dropped), {} political / {} geographic keys",
                    file_name,
                    partial.rows_read,
                    partial.rows_dropped,
                    political,
                    geographic
                );
                FileOutcome::completed(file_name, 1)
            }
            Err(e) => {
                log::warn!("Failed to aggregate {}: {}", file_name, e);
                FileOutcome::failed(file_name, 1, e)
            }
        }
    }

    /// Read a whole file into fresh local stores, bounded by the file timeout.
    async fn aggregate_file(
        &self,
        hasher: FingerprintHasher,
        path: &Path,
    ) -> Result<PartialAggregate> {
        let cancel = Arc::new(AtomicBool::new(false));
        let task = tokio::task::spawn_blocking({
            let cancel = Arc::clone(&cancel);
            let schema = self.schema.clone();
            let path = path.to_path_buf();
            move || aggregate_rows(EventReader::open(&path, schema)?, &hasher, &cancel)
        });

        match tokio::time::timeout(self.file_timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => {
                // The reader thread stops at its next row; its result is discarded.
                cancel.store(true, Ordering::Relaxed);
                Err(AppError::timeout(
                    format!("aggregating {}", path.display()),
                    self.file_timeout,
                ))
            }
        }
    }
}

/// Fold every row of `reader` into a new [`PartialAggregate`].
///
/// Rows with an unparsable scale are dropped from both dimensions; rows with
/// an empty code only skip the dimension the code belongs to.
pub fn aggregate_rows<R: Read>(
    mut reader: EventReader<R>,
    hasher: &FingerprintHasher,
    cancel: &AtomicBool,
) -> Result<PartialAggregate> {
    let mut partial = PartialAggregate::default();

    while let Some(row) = reader.next_row()? {
        if cancel.load(Ordering::Relaxed) {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "aggregation cancelled",
            )));
        }
        partial.rows_read += 1;

        let RowResult::Parsed(record) = row else {
            partial.rows_dropped += 1;
            continue;
        };
        let Some(scale) = record.scale() else {
            partial.rows_dropped += 1;
            continue;
        };

        for dimension in Dimension::ALL {
            if let Some((code1, code2)) = record.codes(dimension) {
                let key = hasher.pair_key(&record.year, code1, code2);
                partial
                    .store_mut(dimension)
                    .upsert(key, &record.year, code1, code2, scale);
            }
        }
    }

    Ok(partial)
}

/// Registry name of an input path.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
