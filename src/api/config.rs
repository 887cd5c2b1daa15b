use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use knuffel::Decode;

pub const DEFAULT_DETECTOR: &str = "agnentro/tmp/agnentroscan";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const CONFIG_FILE_NAME: &str = "scan.kdl";

#[derive(Decode, Debug, Clone, PartialEq)]
pub struct ScanConfig {
    #[knuffel(child)]
    pub detector: Option<DetectorConfig>,
    #[knuffel(child)]
    pub collect: Option<CollectConfig>,
}

#[derive(Decode, Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    #[knuffel(property)]
    pub binary: Option<String>,
    /// Seconds; 0 disables the limit.
    #[knuffel(property)]
    pub timeout: Option<u64>,
}

#[derive(Decode, Debug, Clone, PartialEq)]
pub struct CollectConfig {
    #[knuffel(property)]
    pub policy: Option<String>,
}

/// What the collector does when one sample fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Stop the run; the result table is left untouched.
    #[default]
    Abort,
    /// Log the failure and continue with the next sample.
    Skip,
}

impl FromStr for OnError {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(OnError::Abort),
            "skip" => Ok(OnError::Skip),
            other => Err(format!("unknown error policy '{}' (expected abort or skip)", other)),
        }
    }
}

impl ScanConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = knuffel::parse(CONFIG_FILE_NAME, &content)?;
        Ok(config)
    }

    /// `explicit` if given, else the per-user config file if present, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                log::info!("Using configuration from {}", path.display());
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "entroscan", "entroscan")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn binary(&self) -> PathBuf {
        self.detector
            .as_ref()
            .and_then(|d| d.binary.clone())
            .unwrap_or_else(|| DEFAULT_DETECTOR.to_string())
            .into()
    }

    pub fn timeout(&self) -> Option<Duration> {
        let secs = self
            .detector
            .as_ref()
            .and_then(|d| d.timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    pub fn policy(&self) -> anyhow::Result<OnError> {
        match self.collect.as_ref().and_then(|c| c.policy.as_deref()) {
            Some(p) => p.parse().map_err(anyhow::Error::msg),
            None => Ok(OnError::default()),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            detector: Some(DetectorConfig {
                binary: Some(DEFAULT_DETECTOR.to_string()),
                timeout: Some(DEFAULT_TIMEOUT_SECS),
            }),
            collect: Some(CollectConfig {
                policy: Some("abort".to_string()),
            }),
        }
    }
}
