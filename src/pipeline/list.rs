// src/pipeline/list.rs

//! Candidate listing step.

use std::path::Path;

use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::IndexLister;
use crate::utils::log::{header, sub_item};

/// Scrape the archive index and save the candidate list to the data directory.
pub async fn run_list(config: &Config, client: &Client) -> Result<Vec<String>> {
    header("Listing remote archives");

    let lister = IndexLister::new(&config.acquisition, client.clone())?;
    let candidates = lister.list().await?;

    let path = config.paths.candidates_file();
    save_candidates(&path, &candidates).await?;
    sub_item(&format!(
        "{} candidates saved to {}",
        candidates.len(),
        path.display()
    ));

    Ok(candidates)
}

/// Write a candidate list as JSON.
pub async fn save_candidates(path: &Path, candidates: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(candidates)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Read a candidate list saved by [`save_candidates`].
pub async fn load_candidates(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::config(format!(
            "candidate list {} not readable ({}). Run 'list' first.",
            path.display(),
            e
        ))
    })?;
    Ok(serde_json::from_str(&content)?)
}
