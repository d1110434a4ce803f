// src/pipeline/pipeline.rs

use reqwest::Client;

use crate::error::Result;
use crate::models::{BatchReport, Config};
use crate::storage::StateStorage;
use crate::utils::log::{header, separator, step};

use super::aggregate::run_aggregate;
use super::export::export_state;
use super::fetch::run_fetch;
use super::list::{load_candidates, run_list};

/// Per-step reports of a full run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub downloads: Option<BatchReport>,
    pub aggregation: BatchReport,
}

/// Run the full pipeline: list, fetch, aggregate, export.
pub async fn run_pipeline(
    config: &Config,
    storage: &dyn StateStorage,
    client: &Client,
    skip_list: bool,
    skip_fetch: bool,
) -> Result<PipelineReport> {
    header("Pipeline starting");

    let total_steps = match (skip_list, skip_fetch) {
        (_, true) => 2,
        (true, false) => 3,
        (false, false) => 4,
    };
    let mut current_step = 1;
    let mut report = PipelineReport::default();

    if !skip_fetch {
        let candidates = if skip_list {
            log::info!("Skipping list, loading saved candidates...");
            load_candidates(&config.paths.candidates_file()).await?
        } else {
            step(current_step, total_steps, "List - Scraping archive index");
            current_step += 1;
            run_list(config, client).await?
        };

        step(current_step, total_steps, "Fetch - Downloading archives");
        current_step += 1;
        report.downloads = Some(run_fetch(config, client, &candidates).await?);
    }

    step(current_step, total_steps, "Aggregate - Folding inputs into checkpoint");
    current_step += 1;
    let run = run_aggregate(config, storage).await?;
    report.aggregation = run.report;

    step(current_step, total_steps, "Export - Writing results");
    export_state(config, &run.state, &config.paths.output).await?;

    separator();
    log::info!("Pipeline complete!");
    Ok(report)
}
