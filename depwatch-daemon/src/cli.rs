//! CLI argument definitions for depwatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use depwatch_core::config::{DEFAULT_CONFIG_FILE, DepwatchConfig};

/// depwatch dependency vulnerability and license daemon.
///
/// Opens one session per project directory, scans every detected build
/// system, and rescans when manifests or the configuration change.
#[derive(Parser, Debug)]
#[command(name = "depwatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to depwatch.toml configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Project directory to watch. May be repeated.
    ///
    /// Defaults to the current directory when omitted.
    #[arg(short, long = "project", value_name = "DIR")]
    pub projects: Vec<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Scan every project once, print a JSON report and exit.
    #[arg(long)]
    pub once: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut DepwatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }

    /// Project directories, falling back to the current directory.
    pub fn project_dirs(&self) -> std::io::Result<Vec<PathBuf>> {
        if self.projects.is_empty() {
            return Ok(vec![std::env::current_dir()?]);
        }
        Ok(self.projects.clone())
    }
}
