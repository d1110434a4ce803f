//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ColumnSchema;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote archive and download behavior
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Input discovery and row aggregation
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Result export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Working directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Load the configuration a command runs with.
    ///
    /// A missing file falls back to defaults. A file that exists but does not
    /// parse, or values that fail `validate`, are errors.
    pub fn load_for_run(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            Self::load(path)?
        } else {
            Self::load_or_default(path)
        };
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let acq = &self.acquisition;
        if acq.base_url.trim().is_empty() {
            return Err(AppError::validation("acquisition.base_url is empty"));
        }
        url::Url::parse(&acq.base_url)?;
        if let Some(index_url) = &acq.index_url {
            url::Url::parse(index_url)?;
        }
        if acq.user_agent.trim().is_empty() {
            return Err(AppError::validation("acquisition.user_agent is empty"));
        }
        if acq.timeout_secs == 0 {
            return Err(AppError::validation("acquisition.timeout_secs must be > 0"));
        }
        if acq.index_timeout_secs == 0 {
            return Err(AppError::validation(
                "acquisition.index_timeout_secs must be > 0",
            ));
        }
        if acq.max_attempts == 0 {
            return Err(AppError::validation("acquisition.max_attempts must be > 0"));
        }
        acq.file_regex()?;

        let proc = &self.processing;
        if proc.input_extension.trim().is_empty() {
            return Err(AppError::validation("processing.input_extension is empty"));
        }
        if proc.file_timeout_secs == 0 {
            return Err(AppError::validation(
                "processing.file_timeout_secs must be > 0",
            ));
        }
        if proc.checkpoint_interval == 0 {
            return Err(AppError::validation(
                "processing.checkpoint_interval must be > 0",
            ));
        }
        proc.input_regex()?;

        if self.export.timeout_secs == 0 {
            return Err(AppError::validation("export.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Remote archive and download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Base URL the candidate file names are appended to
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Index page listing the archives (defaults to `{base_url}/index.html`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,

    /// CSS selector for link elements on the index page
    #[serde(default = "defaults::link_selector")]
    pub link_selector: String,

    /// Regex a candidate file name must match
    #[serde(default = "defaults::file_pattern")]
    pub file_pattern: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Time budget for one download attempt in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Time budget for loading the index page in seconds
    #[serde(default = "defaults::index_timeout")]
    pub index_timeout_secs: u64,

    /// Attempts per file before it is reported as failed
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,
}

impl AcquisitionConfig {
    pub fn index_url(&self) -> String {
        self.index_url
            .clone()
            .unwrap_or_else(|| format!("{}/index.html", self.base_url.trim_end_matches('/')))
    }

    pub fn file_regex(&self) -> Result<Regex> {
        Ok(Regex::new(&self.file_pattern)?)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            index_url: None,
            link_selector: defaults::link_selector(),
            file_pattern: defaults::file_pattern(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            index_timeout_secs: defaults::index_timeout(),
            max_attempts: defaults::max_attempts(),
        }
    }
}

/// Input discovery and aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Extension of extracted input files (case-insensitive)
    #[serde(default = "defaults::input_extension")]
    pub input_extension: String,

    /// Regex applied to the part of the file name before the first `.`
    #[serde(default = "defaults::input_pattern")]
    pub input_pattern: String,

    /// Time budget for aggregating one file in seconds
    #[serde(default = "defaults::file_timeout")]
    pub file_timeout_secs: u64,

    /// Number of committed files between checkpoints
    #[serde(default = "defaults::checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Column positions in the input rows
    #[serde(default)]
    pub columns: ColumnSchema,
}

impl ProcessingConfig {
    pub fn input_regex(&self) -> Result<Regex> {
        Ok(Regex::new(&self.input_pattern)?)
    }

    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            input_extension: defaults::input_extension(),
            input_pattern: defaults::input_pattern(),
            file_timeout_secs: defaults::file_timeout(),
            checkpoint_interval: defaults::checkpoint_interval(),
            columns: ColumnSchema::default(),
        }
    }
}

/// Result export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Shared time budget for writing both outputs in seconds
    #[serde(default = "defaults::export_timeout")]
    pub timeout_secs: u64,

    /// Keep the previous output as `<file>.bak`
    #[serde(default = "defaults::keep_backup")]
    pub keep_backup: bool,
}

impl ExportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::export_timeout(),
            keep_backup: defaults::keep_backup(),
        }
    }
}

/// Working directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Downloaded archives and their extracted inputs
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Checkpoint artifacts
    #[serde(default = "defaults::checkpoint_dir")]
    pub checkpoint_dir: PathBuf,

    /// Export base path; dimension suffixes are appended
    #[serde(default = "defaults::output")]
    pub output: PathBuf,
}

impl PathsConfig {
    /// Resolve relative paths against `base`.
    pub fn rooted_at(&self, base: &Path) -> Self {
        Self {
            data_dir: base.join(&self.data_dir),
            checkpoint_dir: base.join(&self.checkpoint_dir),
            output: base.join(&self.output),
        }
    }

    /// Location of the saved candidate list.
    pub fn candidates_file(&self) -> PathBuf {
        self.data_dir.join("candidates.json")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            checkpoint_dir: defaults::checkpoint_dir(),
            output: defaults::output(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Acquisition defaults
    pub fn base_url() -> String {
        "http://data.gdeltproject.org/events".into()
    }
    pub fn link_selector() -> String {
        "a".into()
    }
    pub fn file_pattern() -> String {
        r"^[0-9]+\S+\.zip$".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; tally/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn index_timeout() -> u64 {
        3
    }
    pub fn max_attempts() -> u32 {
        3
    }

    // Processing defaults
    pub fn input_extension() -> String {
        "csv".into()
    }
    pub fn input_pattern() -> String {
        r"^[0-9]+\S+$".into()
    }
    pub fn file_timeout() -> u64 {
        60
    }
    pub fn checkpoint_interval() -> usize {
        1
    }

    // Export defaults
    pub fn export_timeout() -> u64 {
        10
    }
    pub fn keep_backup() -> bool {
        true
    }

    // Path defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }
    pub fn checkpoint_dir() -> PathBuf {
        PathBuf::from("data/checkpoint")
    }
    pub fn output() -> PathBuf {
        PathBuf::from("data/results")
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.acquisition.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.acquisition.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_patterns() {
        let mut config = Config::default();
        config.processing.input_pattern = "([0-9]".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_relative_base_url() {
        let mut config = Config::default();
        config.acquisition.base_url = "data.gdeltproject.org/events".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [acquisition]
            max_attempts = 5

            [processing.columns]
            scale = 31
            "#,
        )
        .unwrap();

        assert_eq!(config.acquisition.max_attempts, 5);
        assert_eq!(config.acquisition.timeout_secs, 10);
        assert_eq!(config.processing.columns.scale, 31);
        assert_eq!(config.processing.columns.year, 3);
        assert!(config.export.keep_backup);
    }

    #[test]
    fn index_url_defaults_to_base() {
        let config = AcquisitionConfig::default();
        assert_eq!(
            config.index_url(),
            "http://data.gdeltproject.org/events/index.html"
        );
    }

    #[test]
    fn load_for_run_defaults_when_missing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config::load_for_run(tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.acquisition.max_attempts, defaults::max_attempts());
    }

    #[test]
    fn load_for_run_rejects_malformed_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("tally.toml");
        fs::write(&path, "[acquisition\nmax_attempts = ").unwrap();
        assert!(Config::load_for_run(&path).is_err());
    }

    #[test]
    fn load_for_run_rejects_invalid_values() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("tally.toml");
        fs::write(&path, "[export]\ntimeout_secs = 0\n").unwrap();
        assert!(Config::load_for_run(&path).is_err());
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let mut config = Config::default();
        config.processing.checkpoint_interval = 4;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.processing.checkpoint_interval, 4);
        assert_eq!(loaded.paths.data_dir, PathBuf::from("data"));
    }
}
