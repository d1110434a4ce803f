//! Pipeline entry points for aggregation operations.
//!
//! - `run_list`: Scrape the archive index for candidate files
//! - `run_fetch`: Download and extract candidates
//! - `run_aggregate`: Fold extracted inputs into the checkpointed state
//! - `run_export`: Write the checkpointed state as delimited files
//! - `run_pipeline`: All of the above in order

pub mod aggregate;
pub mod discover;
pub mod export;
pub mod fetch;
pub mod list;
#[allow(clippy::module_inception)]
pub mod pipeline;

pub use aggregate::{AggregateRun, run_aggregate};
pub use discover::discover_inputs;
pub use export::run_export;
pub use fetch::run_fetch;
pub use list::{load_candidates, run_list};
pub use pipeline::{PipelineReport, run_pipeline};
