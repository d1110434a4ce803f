// src/pipeline/discover.rs

//! Input file discovery in the data directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::ProcessingConfig;

/// Extracted input files in `dir`, ordered by file name.
///
/// The order is the commit order of the registry, so it has to be stable
/// across runs.
pub async fn discover_inputs(dir: &Path, config: &ProcessingConfig) -> Result<Vec<PathBuf>> {
    let pattern = config.input_regex()?;
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        AppError::setup(format!("cannot read data directory {}: {}", dir.display(), e))
    })?;

    let mut inputs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if is_input(&path, &config.input_extension, &pattern) {
            inputs.push(path);
        }
    }
    inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    log_year_groups(&inputs);
    Ok(inputs)
}

/// Whether `path` names an input file.
///
/// The extension is compared case-insensitively. The pattern is matched
/// against the name up to its first `.`, which must be longer than four
/// characters so a bare year file never counts as input.
pub fn is_input(path: &Path, extension: &str, pattern: &Regex) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let stem = name.split('.').next().unwrap_or_default();
    if stem.chars().count() <= 4 {
        return false;
    }
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension.trim_start_matches('.')));

    has_extension && pattern.is_match(stem)
}

fn log_year_groups(inputs: &[PathBuf]) {
    let mut years: BTreeMap<String, usize> = BTreeMap::new();
    for path in inputs {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let year: String = name.chars().take(4).collect();
        *years.entry(year).or_default() += 1;
    }

    log::info!("Discovered {} input files", inputs.len());
    for (year, count) in &years {
        log::debug!("  {}: {} files", year, count);
    }
}
