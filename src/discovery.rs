use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;

use crate::error::{Result, ScanError};

pub const SAMPLE_EXT: &str = "npy";
pub const METADATA_EXT: &str = "txt";

/// A sample array and the metadata file that describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePair {
    pub sample: PathBuf,
    pub metadata: PathBuf,
}

/// Finds sample and metadata files under `root` and pairs them by sorted
/// position.
///
/// Without `subdir` every file at any depth is considered. With `subdir`
/// only files directly inside `root/subdir` are. Pairing never looks at
/// file contents; surplus files on either side are dropped with a warning.
pub fn discover(root: &Path, subdir: Option<&str>) -> Result<Vec<SamplePair>> {
    let (base, max_depth) = match subdir {
        Some(dir) => (root.join(dir), 1),
        None => (root.to_path_buf(), usize::MAX),
    };

    let mut samples = Vec::new();
    let mut metadata = Vec::new();
    for entry in WalkDir::new(&base).min_depth(1).max_depth(max_depth) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.clone());
            ScanError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.path().extension().and_then(|e| e.to_str()) {
            Some(SAMPLE_EXT) => samples.push(entry.into_path()),
            Some(METADATA_EXT) => metadata.push(entry.into_path()),
            _ => {}
        }
    }
    samples.sort();
    metadata.sort();

    if samples.len() != metadata.len() {
        warn!(
            "Found {} .{} files but {} .{} files under {}; pairing the first {}",
            samples.len(),
            SAMPLE_EXT,
            metadata.len(),
            METADATA_EXT,
            base.display(),
            samples.len().min(metadata.len())
        );
    }

    let pairs: Vec<SamplePair> = samples
        .into_iter()
        .zip(metadata)
        .map(|(sample, metadata)| SamplePair { sample, metadata })
        .collect();
    info!("Discovered {} sample pairs under {}", pairs.len(), base.display());
    Ok(pairs)
}
