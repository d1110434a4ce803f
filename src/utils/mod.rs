//! Utility functions and helpers.

pub mod fingerprint;
pub mod http;
pub mod log;
