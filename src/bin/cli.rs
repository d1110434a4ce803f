//! Tally CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tally::{
    error::{AppError, Result},
    models::Config,
    pipeline,
    storage::{CheckpointManager, StateStorage},
    utils::http,
};

/// Tally - resumable event-log aggregation
#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version,
    about = "Download, aggregate and export event-log archives"
)]
struct Cli {
    /// Path to the configuration file; relative paths inside it resolve
    /// against its directory
    #[arg(short, long, default_value = "tally.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape the archive index and save the candidate list
    List,

    /// Download and extract candidate archives
    Fetch {
        /// Candidate list (default: {data_dir}/candidates.json)
        #[arg(long)]
        candidates: Option<PathBuf>,
    },

    /// Aggregate extracted input files into the checkpoint
    Aggregate,

    /// Export the checkpointed aggregates
    Export {
        /// Output base path (default: paths.output from the config)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run full pipeline: List → Fetch → Aggregate → Export
    Pipeline {
        /// Skip listing, use the saved candidate list
        #[arg(long)]
        skip_list: bool,

        /// Skip listing and downloading, aggregate what is on disk
        #[arg(long)]
        skip_fetch: bool,
    },

    /// Show current checkpoint info
    Info,

    /// Discard the checkpoint and start over on the next run
    Clear,

    /// Validate the configuration file
    Validate,

    /// Write a configuration file with default values
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Log level named by the config file, if it can be read.
fn configured_level(path: &Path) -> String {
    Config::load(path)
        .map(|config| config.logging.level)
        .unwrap_or_else(|_| "info".to_string())
}

/// Load and validate the configuration, resolving its paths against the
/// file's directory.
fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_for_run(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(Config {
        paths: config.paths.rooted_at(base),
        ..config
    })
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, &configured_level(&cli.config));

    if let Command::InitConfig { force } = cli.command {
        return init_config(&cli.config, force);
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration {}: {}", cli.config.display(), e);
            return Err(e);
        }
    };
    log::info!("Loaded configuration from {}", cli.config.display());

    let storage = CheckpointManager::new(&config.paths.checkpoint_dir);

    match cli.command {
        Command::List => {
            let client = http::create_async_client(&config.acquisition)?;
            pipeline::run_list(&config, &client).await?;
        }

        Command::Fetch { candidates } => {
            let path = candidates.unwrap_or_else(|| config.paths.candidates_file());
            let candidates = pipeline::load_candidates(&path).await?;
            log::info!("Loaded {} candidates from {}", candidates.len(), path.display());

            let client = http::create_async_client(&config.acquisition)?;
            pipeline::run_fetch(&config, &client, &candidates).await?;
        }

        Command::Aggregate => {
            pipeline::run_aggregate(&config, &storage).await?;
        }

        Command::Export { output } => {
            let output = output.unwrap_or_else(|| config.paths.output.clone());
            pipeline::run_export(&config, &storage, &output).await?;
        }

        Command::Pipeline {
            skip_list,
            skip_fetch,
        } => {
            let client = http::create_async_client(&config.acquisition)?;
            pipeline::run_pipeline(&config, &storage, &client, skip_list, skip_fetch).await?;
        }

        Command::Info => {
            log::info!("Data directory: {}", config.paths.data_dir.display());
            log::info!("Checkpoint directory: {}", storage.root_dir().display());

            match storage.manifest().await? {
                Some(manifest) => {
                    log::info!("Checkpoint generation: {}", manifest.generation);
                    log::info!("Saved at: {}", manifest.saved_at);
                    log::info!("Key seed: {}", manifest.seed);
                    log::info!("Processed files: {}", manifest.processed_files);
                    log::info!("Political records: {}", manifest.political_records);
                    log::info!("Geographic records: {}", manifest.geographic_records);
                }
                None => log::info!("No checkpoint found"),
            }
        }

        Command::Clear => {
            storage.clear().await?;
        }

        Command::Validate => {
            log::info!("✓ Config OK");
        }

        Command::InitConfig { .. } => {}
    }

    Ok(())
}

/// Write the default configuration to `path`.
fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        log::warn!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
        return Err(AppError::config("config file already exists"));
    }
    Config::default().save(path)?;
    log::info!("Default configuration written to {}", path.display());
    Ok(())
}
