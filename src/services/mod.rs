//! Service layer for the aggregation application.
//!
//! This module contains the business logic for:
//! - Candidate listing from the archive index (`IndexLister`)
//! - Archive download and extraction (`Downloader`)
//! - Event row reading (`EventReader`)
//! - Per-file aggregation (`RecordProcessor`)
//! - Result export (`Exporter`)

pub mod acquisition;
pub mod exporter;
pub mod listing;
pub mod parser;
pub mod processor;

pub use acquisition::{Downloader, HttpTransport, Transport};
pub use exporter::Exporter;
pub use listing::IndexLister;
pub use parser::EventReader;
pub use processor::RecordProcessor;
