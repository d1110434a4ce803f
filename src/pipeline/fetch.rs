// src/pipeline/fetch.rs

//! Download step.

use reqwest::Client;

use crate::error::Result;
use crate::models::{BatchReport, Config};
use crate::services::Downloader;
use crate::utils::log::{header, sub_item, summary};

/// Download and extract every candidate into the data directory.
///
/// Files that fail all attempts are listed in the returned report.
pub async fn run_fetch(config: &Config, client: &Client, candidates: &[String]) -> Result<BatchReport> {
    header("Downloading archives");

    let downloader = Downloader::from_config(&config.acquisition, client.clone())?;
    let report = downloader
        .fetch_all(candidates, &config.paths.data_dir)
        .await?;

    log_report("Download", &report);
    Ok(report)
}

/// Summarize a batch report in the running log.
pub fn log_report(title: &str, report: &BatchReport) {
    summary(
        title,
        &[
            ("Total", report.total().to_string()),
            ("Completed", report.completed().to_string()),
            ("Skipped", report.skipped().to_string()),
            ("Failed", report.failed().to_string()),
        ],
    );
    for failure in report.failures() {
        sub_item(&failure.to_string());
    }
}
