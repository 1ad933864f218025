//! Command-line interface definitions for secfeed.
//!
//! Everything else (feeds, categories, models, reporting) lives in the YAML
//! configuration file.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for secfeed.
///
/// # Examples
///
/// ```sh
/// # Default config.yml in the working directory
/// secfeed
///
/// # Custom config, debug logging, logs also appended to a file
/// secfeed -c ./feeds.yml -v -l ./secfeed.log
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about = "Security news feed classifier and summarizer")]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also append logs to this file
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,
}
