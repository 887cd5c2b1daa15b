use crate::api::config::{OnError, ScanConfig};
use crate::api::detector::{DetectorType, ScanParams};
use crate::util::{detector_type_parser, policy_parser, sweep_parser};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Runs an entropy detector over every haystack under a directory and accumulates the results.")]
#[command(allow_negative_numbers = true)]
pub struct Cli {
    /// Detector type: j (Jensen-Shannon exodivergence), i (Leidich exodivergence), x (exoelasticity) or a
    #[arg(index = 1, value_parser = detector_type_parser)]
    pub detector_type: DetectorType,
    /// Directory holding the haystacks; results are written here too
    #[arg(index = 2)]
    pub root: PathBuf,

    /// Scan only this subdirectory of the root (default: all subdirectories)
    #[arg(long)]
    pub subdir: Option<String>,
    /// Geometry bitmask controlling mask processing
    #[arg(long, default_value_t = 0)]
    pub geo: i64,
    /// Sweep window size in bytes
    #[arg(long, default_value = "250000", value_parser = sweep_parser)]
    pub sweep: u64,
    /// Number of ranked matches the detector should report
    #[arg(long, default_value_t = 1)]
    pub ranks: u32,
    /// Detector output format code
    #[arg(long = "out-format", alias = "out_format", default_value_t = 3)]
    pub out_format: u32,

    /// Configuration file (default: scan.kdl in the user config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Detector binary, overriding the configuration
    #[arg(long = "detector-bin")]
    pub detector_bin: Option<PathBuf>,
    /// Per-sample detector timeout in seconds, 0 for none
    #[arg(long)]
    pub timeout: Option<u64>,
    /// What to do when a sample fails: abort or skip
    #[arg(long = "on-error", value_parser = policy_parser)]
    pub on_error: Option<OnError>,
}

/// Effective settings after applying command-line overrides to the config.
#[derive(Debug, Clone)]
pub struct Settings {
    pub params: ScanParams,
    pub binary: PathBuf,
    pub timeout: Option<Duration>,
    pub policy: OnError,
}

impl Cli {
    pub fn params(&self) -> ScanParams {
        ScanParams {
            detector_type: self.detector_type,
            geometry: self.geo,
            sweep: self.sweep,
            ranks: self.ranks,
            out_format: self.out_format,
        }
    }

    pub fn settings(&self, config: &ScanConfig) -> anyhow::Result<Settings> {
        let timeout = match self.timeout {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => config.timeout(),
        };
        let policy = match self.on_error {
            Some(policy) => policy,
            None => config.policy()?,
        };
        Ok(Settings {
            params: self.params(),
            binary: self.detector_bin.clone().unwrap_or_else(|| config.binary()),
            timeout,
            policy,
        })
    }
}
