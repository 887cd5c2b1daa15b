use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::debug;

use crate::error::{Result, ScanError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorType {
    /// Leidich exodivergence
    Leidich,
    /// Jensen-Shannon exodivergence
    JensenShannon,
    /// Exoelasticity
    Exoelasticity,
    A,
}

impl DetectorType {
    pub fn code(&self) -> &'static str {
        match self {
            DetectorType::Leidich => "i",
            DetectorType::JensenShannon => "j",
            DetectorType::Exoelasticity => "x",
            DetectorType::A => "a",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "i" => Some(DetectorType::Leidich),
            "j" => Some(DetectorType::JensenShannon),
            "x" => Some(DetectorType::Exoelasticity),
            "a" => Some(DetectorType::A),
            _ => None,
        }
    }

    /// Name of the result table this type accumulates into.
    pub fn results_file_name(&self) -> String {
        format!("{}_results.csv", self.code())
    }
}

impl fmt::Display for DetectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Parameters shared by every detector invocation of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanParams {
    pub detector_type: DetectorType,
    pub geometry: i64,
    pub sweep: u64,
    pub ranks: u32,
    pub out_format: u32,
}

pub struct DetectorRequest<'a> {
    pub params: &'a ScanParams,
    pub sample: &'a Path,
}

impl DetectorRequest<'_> {
    /// Arguments in the order the detector expects them.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            self.params.detector_type.code().into(),
            self.sample.as_os_str().to_owned(),
            self.params.geometry.to_string().into(),
            self.params.sweep.to_string().into(),
            self.params.ranks.to_string().into(),
            self.params.out_format.to_string().into(),
        ]
    }
}

pub trait Detector {
    /// Runs the detector on one sample and returns its raw stdout.
    fn run(&self, request: &DetectorRequest<'_>) -> Result<Vec<u8>>;
}

/// Runs an external detector binary, one blocking process per sample.
pub struct ProcessDetector {
    binary: PathBuf,
    timeout: Option<Duration>,
    runtime: tokio::runtime::Runtime,
}

impl ProcessDetector {
    pub fn new(binary: impl Into<PathBuf>, timeout: Option<Duration>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ScanError::Config(format!("failed to start runtime: {}", e)))?;
        Ok(Self {
            binary: binary.into(),
            timeout,
            runtime,
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Detector for ProcessDetector {
    fn run(&self, request: &DetectorRequest<'_>) -> Result<Vec<u8>> {
        let args = request.args();
        debug!("Running {} {:?}", self.binary.display(), args);

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = self.runtime.block_on(async {
            let child = cmd.output();
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, child).await {
                    Ok(result) => Ok(result),
                    Err(_) => Err(ScanError::DetectorTimeout {
                        path: request.sample.to_path_buf(),
                        timeout: limit,
                    }),
                },
                None => Ok(child.await),
            }
        })?;

        let output = output.map_err(|source| ScanError::DetectorSpawn {
            binary: self.binary.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ScanError::DetectorExit {
                path: request.sample.to_path_buf(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!("Detector wrote {} bytes for {}", output.stdout.len(), request.sample.display());
        Ok(output.stdout)
    }
}
