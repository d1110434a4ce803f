// src/services/exporter.rs

//! Result export.
//!
//! Each dimension becomes one delimited file next to the configured output
//! base, e.g. `results.political.csv`. Both files are written to `.tmp`
//! siblings concurrently under one shared timeout and are only renamed into
//! place once both writes succeeded. If either rename fails, the previous
//! pair is restored.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::{AggregateRecord, AggregateStore, AggregationState, Dimension, ExportConfig};
use crate::storage::local::remove_quietly;

/// Header row of every export file, in record field order.
pub const EXPORT_HEADER: [&str; 15] = [
    "Year",
    "CountryCode1",
    "CountryCode2",
    "ScaleSum",
    "PositiveScaleSum",
    "NegativeScaleSum",
    "NeutralScaleSum",
    "MorePositiveScaleSum",
    "MoreNegativeScaleSum",
    "ScaleCount",
    "PositiveScaleCount",
    "NegativeScaleCount",
    "NeutralScaleCount",
    "MorePositiveScaleCount",
    "MoreNegativeScaleCount",
];

/// One written export file.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub dimension: Dimension,
    pub path: PathBuf,
    pub rows: usize,
}

/// Writes both aggregate stores as delimited text.
#[derive(Debug, Clone)]
pub struct Exporter {
    timeout: Duration,
    keep_backup: bool,
}

impl Exporter {
    pub fn new(config: &ExportConfig) -> Self {
        Self::with_options(config.timeout(), config.keep_backup)
    }

    pub fn with_options(timeout: Duration, keep_backup: bool) -> Self {
        Self {
            timeout,
            keep_backup,
        }
    }

    /// Export both dimensions of `state` under `output_base`.
    ///
    /// On failure the previous canonical files are left in place and no temp
    /// file is left behind.
    pub async fn export(
        &self,
        state: &AggregationState,
        output_base: &Path,
    ) -> Result<Vec<ExportedFile>> {
        if let Some(parent) = output_base.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::setup(format!(
                        "cannot create output directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let political = output_path(output_base, Dimension::Political);
        let geographic = output_path(output_base, Dimension::Geographic);
        let political_tmp = temp_path(&political);
        let geographic_tmp = temp_path(&geographic);

        let cancel = Arc::new(AtomicBool::new(false));
        let mut political_task = write_rows(
            export_rows(state.store(Dimension::Political)),
            political_tmp.clone(),
            Arc::clone(&cancel),
        );
        let mut geographic_task = write_rows(
            export_rows(state.store(Dimension::Geographic)),
            geographic_tmp.clone(),
            Arc::clone(&cancel),
        );

        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut written = [0usize; 2];
        let mut failure = None;
        for (rows, task) in written
            .iter_mut()
            .zip([&mut political_task, &mut geographic_task])
        {
            match tokio::time::timeout_at(deadline, &mut *task).await {
                Ok(Ok(Ok(count))) => *rows = count,
                Ok(Ok(Err(e))) => failure = Some(e),
                Ok(Err(e)) => failure = Some(e.into()),
                Err(_) => {
                    failure = Some(AppError::timeout("writing export files", self.timeout))
                }
            }
            if failure.is_some() {
                break;
            }
        }

        if let Some(e) = failure {
            // Writers must be gone before their temp files are swept.
            cancel.store(true, Ordering::Relaxed);
            for task in [political_task, geographic_task] {
                if !task.is_finished() {
                    let _ = task.await;
                }
            }
            discard(&[&political_tmp, &geographic_tmp]).await;
            return Err(e);
        }

        self.commit(&[(&political_tmp, &political), (&geographic_tmp, &geographic)])
            .await?;

        let files = vec![
            ExportedFile {
                dimension: Dimension::Political,
                path: political,
                rows: written[0],
            },
            ExportedFile {
                dimension: Dimension::Geographic,
                path: geographic,
                rows: written[1],
            },
        ];
        for file in &files {
            log::info!(
                "Exported {} rows ({}) to {}",
                file.rows,
                file.dimension,
                file.path.display()
            );
        }
        Ok(files)
    }

    /// Move finished temp files into place as one unit.
    ///
    /// Existing files are held aside first. If any rename fails, the files
    /// published so far are removed and the held ones are moved back. On
    /// success the held files become `.bak` or are deleted.
    async fn commit(&self, staged: &[(&Path, &Path)]) -> Result<()> {
        let mut held: Vec<(PathBuf, &Path)> = Vec::new();
        let mut published: Vec<&Path> = Vec::new();
        let mut failure = None;

        for &(tmp, path) in staged {
            let existing = tokio::fs::metadata(path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if existing {
                let hold = holding_path(path);
                remove_quietly(&hold).await;
                if let Err(e) = tokio::fs::rename(path, &hold).await {
                    failure = Some(e);
                    break;
                }
                held.push((hold, path));
            }
            if let Err(e) = tokio::fs::rename(tmp, path).await {
                failure = Some(e);
                break;
            }
            published.push(path);
        }

        if let Some(e) = failure {
            for path in &published {
                remove_quietly(path).await;
            }
            for (hold, path) in &held {
                if let Err(restore) = tokio::fs::rename(hold, path).await {
                    log::warn!(
                        "Could not restore {} from {}: {}",
                        path.display(),
                        hold.display(),
                        restore
                    );
                }
            }
            for &(tmp, _) in staged {
                remove_quietly(tmp).await;
            }
            return Err(e.into());
        }

        for (hold, path) in held {
            if self.keep_backup {
                let backup = backup_path(path);
                remove_quietly(&backup).await;
                match tokio::fs::rename(&hold, &backup).await {
                    Ok(()) => log::debug!("Previous export kept as {}", backup.display()),
                    Err(e) => log::warn!("Could not keep backup {}: {}", backup.display(), e),
                }
            } else {
                remove_quietly(&hold).await;
            }
        }
        Ok(())
    }
}

/// Output file of one dimension.
pub fn output_path(base: &Path, dimension: Dimension) -> PathBuf {
    with_suffix(base, &format!(".{}.csv", dimension.slug()))
}

fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, ".tmp")
}

fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, ".bak")
}

fn holding_path(path: &Path) -> PathBuf {
    with_suffix(path, ".old")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

async fn discard(paths: &[&Path]) {
    for path in paths {
        remove_quietly(path).await;
    }
}

/// Rows for one store: every record, plus its mirror when the codes differ.
///
/// Sorted by year and codes so repeated exports of the same state are
/// byte-identical.
pub fn export_rows(store: &AggregateStore) -> Vec<AggregateRecord> {
    let mut rows = Vec::with_capacity(store.len() * 2);
    for record in store.records() {
        rows.push(record.clone());
        if !record.is_symmetric() {
            rows.push(record.mirrored());
        }
    }
    rows.sort_by(|a, b| {
        (&a.year, &a.country_code1, &a.country_code2).cmp(&(
            &b.year,
            &b.country_code1,
            &b.country_code2,
        ))
    });
    rows
}

/// Serialize rows to `path` on the blocking pool, returning the row count.
///
/// The header is written even when there are no rows. The writer stops
/// early once `cancel` is set.
fn write_rows(
    rows: Vec<AggregateRecord>,
    path: PathBuf,
    cancel: Arc<AtomicBool>,
) -> JoinHandle<Result<usize>> {
    tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)?;
        writer.write_record(EXPORT_HEADER)?;
        for row in &rows {
            if cancel.load(Ordering::Relaxed) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "export cancelled",
                )
                .into());
            }
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(rows.len())
    })
}
