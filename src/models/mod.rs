//! Domain models for the aggregation application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod aggregate;
mod config;
mod event;
mod outcome;
mod registry;
mod state;
mod store;

// Re-export all public types
pub use aggregate::{AggregateRecord, MORE_NEGATIVE_THRESHOLD, MORE_POSITIVE_THRESHOLD};
pub use config::{
    AcquisitionConfig, Config, ExportConfig, LoggingConfig, PathsConfig, ProcessingConfig,
};
pub use event::{ColumnSchema, InputRecord};
pub use outcome::{BatchReport, FileOutcome, FileStatus};
pub use registry::ProcessedInputRegistry;
pub use state::AggregationState;
pub use store::{AggregateStore, Dimension};
