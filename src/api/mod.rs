pub mod config;
pub mod detector;
pub mod store;

pub use config::{OnError, ScanConfig};
pub use detector::{Detector, DetectorRequest, DetectorType, ProcessDetector, ScanParams};
pub use store::{CsvStore, MemoryStore, ResultStore};
