use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed metadata in {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("metadata file {path} defines reserved field '{field}'")]
    ReservedField { path: PathBuf, field: String },

    #[error("unsupported array in {path}: {message}")]
    UnsupportedArray { path: PathBuf, message: String },

    #[error("sample array {0} is empty")]
    EmptySample(PathBuf),

    #[error("failed to launch detector {binary}: {source}")]
    DetectorSpawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("detector exited with {status} on {path}: {stderr}")]
    DetectorExit {
        path: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("detector timed out after {timeout:?} on {path}")]
    DetectorTimeout { path: PathBuf, timeout: Duration },

    #[error("detector output for {path} is {len} bytes, expected at least {expected}")]
    ShortOutput {
        path: PathBuf,
        len: usize,
        expected: usize,
    },

    #[error("field '{field}' is not a 16-digit hex value: {value:?}")]
    MalformedHex { field: String, value: String },

    #[error("result table {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ScanError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors that stop the run regardless of the collection policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ReservedField { .. } | Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
