//! CLI argument definitions for postwatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use postwatch_core::config::PostwatchConfig;

/// MTA delivery log watcher.
///
/// Tails the configured mail log, correlates delivery events into
/// records, announces status changes, and answers `emailstate` queries
/// typed on standard input.
#[derive(Parser, Debug)]
#[command(name = "postwatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to postwatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/postwatch/postwatch.toml")]
    pub config: PathBuf,

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

    /// Override the watched mail log path.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Load the effective configuration.
    ///
    /// Order: file, then `POSTWATCH_*` environment overrides, then
    /// command-line overrides, then validation.
    pub async fn load_config(&self) -> Result<PostwatchConfig> {
        let mut config = PostwatchConfig::from_file(&self.config)
            .await
            .with_context(|| format!("failed to load config {}", self.config.display()))?;
        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config.validate().context("config validation failed")?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the file and environment values.
    pub fn apply_overrides(&self, config: &mut PostwatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.tail.log_file = log_file.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_system_config() {
        let cli = DaemonCli::parse_from(["postwatch-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/postwatch/postwatch.toml"));
        assert!(!cli.validate);
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = DaemonCli::parse_from([
            "postwatch-daemon",
            "-c",
            "local.toml",
            "--log-level",
            "debug",
            "--log-file",
            "/tmp/mainlog",
        ]);
        let mut config = PostwatchConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(cli.config, PathBuf::from("local.toml"));
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.tail.log_file, "/tmp/mainlog");
    }
}
