//! Command-line and environment configuration.
//!
//! Every path flag can also come from a `CO2_*` environment variable, and
//! `main` loads a `.env` file first when one is present.

use crate::api::DEFAULT_API_URL;
use crate::error::ConfigError;
use crate::schedule::{Cadence, PollSchedule};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TOKENS_FILE: &str = "tokens.json";
pub const DEFAULT_REGIONS_FILE: &str = "cloud_regions.json";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "co2-collector",
    version,
    about = "Collects carbon intensity per zone from co2signal.com and attributes it to cloud data centers"
)]
pub struct Cli {
    /// JSON file with the co2signal tokens: [{"user": ..., "token": ...}]
    #[arg(long = "auth-tokens", env = "CO2_AUTH_TOKENS", default_value = DEFAULT_TOKENS_FILE)]
    pub auth_tokens: PathBuf,

    /// JSON file with the cloud regions to collect carbon intensity for
    #[arg(long = "regions-file", env = "CO2_REGIONS_FILE", conflicts_with = "country_zone")]
    pub regions_file: Option<PathBuf>,

    /// Directory receiving the per-zone and per-data-center series
    #[arg(long = "output-dir", visible_alias = "output_dir", env = "CO2_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Query these zones once and print the rows instead of collecting
    #[arg(long = "country-zone", value_name = "CODE", num_args = 1..)]
    pub country_zone: Vec<String>,

    /// co2signal / electricityMap endpoint, if the default has changed
    #[arg(long = "api-url", visible_alias = "api_url", env = "CO2_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Seconds to wait between collection passes
    #[arg(long, env = "CO2_SLEEP_SECS", default_value_t = 900.0)]
    pub sleep: f64,

    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,

    /// Keep the pass period at --sleep instead of sleeping --sleep after each pass
    #[arg(long)]
    pub drift_correction: bool,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

/// What the process does once configuration is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Poll the zones of the regions file and append to the series.
    Collect {
        regions_file: PathBuf,
        output_dir: PathBuf,
    },
    /// Query the given zones once and print the parsed rows.
    OneShot { zones: Vec<String> },
}

impl Cli {
    pub fn mode(&self) -> Result<Mode, ConfigError> {
        if !self.country_zone.is_empty() {
            return Ok(Mode::OneShot {
                zones: self.country_zone.clone(),
            });
        }

        let regions_file = self
            .regions_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REGIONS_FILE));
        let output_dir = self
            .output_dir
            .clone()
            .ok_or(ConfigError::MissingArgument("--output-dir"))?;

        Ok(Mode::Collect {
            regions_file,
            output_dir,
        })
    }

    pub fn schedule(&self) -> Result<PollSchedule, ConfigError> {
        let interval = PollSchedule::interval_from_secs(self.sleep)?;
        let cadence = if self.drift_correction {
            Cadence::FixedRate
        } else {
            Cadence::FixedDelay
        };
        Ok(PollSchedule::new(interval, cadence))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Absolute output directory; it must already exist.
pub fn ensure_output_dir(dir: &Path) -> Result<PathBuf, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::MissingOutputDir(dir.to_path_buf()));
    }
    Ok(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()))
}
