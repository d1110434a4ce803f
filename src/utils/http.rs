// src/utils/http.rs

//! HTTP client utilities.

use crate::error::Result;
use crate::models::AcquisitionConfig;

/// Create a configured asynchronous HTTP client.
///
/// No client-wide timeout is set: every request is raced against the
/// timeout of the step that issues it.
pub fn create_async_client(config: &AcquisitionConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_from_default_config() {
        assert!(create_async_client(&AcquisitionConfig::default()).is_ok());
    }
}
