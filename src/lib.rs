// src/lib.rs

//! Tally: resumable event-log aggregation.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
