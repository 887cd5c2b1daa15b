use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::api::config::OnError;
use crate::api::detector::{Detector, DetectorRequest, ScanParams};
use crate::discovery::SamplePair;
use crate::error::{Result, ScanError};
use crate::output::DetectorOutput;
use crate::record::{self, Record};
use crate::sample::{self, SampleSource};

/// Records gathered by one run, plus the samples skipped under [`OnError::Skip`].
#[derive(Debug, Default)]
pub struct Collection {
    pub records: Vec<Record>,
    pub skipped: Vec<(PathBuf, ScanError)>,
}

pub struct Collector<'a, D: ?Sized, S: ?Sized> {
    detector: &'a D,
    samples: &'a S,
    params: &'a ScanParams,
    policy: OnError,
}

impl<'a, D, S> Collector<'a, D, S>
where
    D: Detector + ?Sized,
    S: SampleSource + ?Sized,
{
    pub fn new(detector: &'a D, samples: &'a S, params: &'a ScanParams, policy: OnError) -> Self {
        Self {
            detector,
            samples,
            params,
            policy,
        }
    }

    /// Enriches every pair in order. Under [`OnError::Abort`] the first
    /// failure is returned; fatal errors are returned under any policy.
    pub fn collect(&self, pairs: &[SamplePair]) -> Result<Collection> {
        let mut collection = Collection::default();
        for (i, pair) in pairs.iter().enumerate() {
            debug!("[{}/{}] {}", i + 1, pairs.len(), pair.sample.display());
            match self.enrich(pair) {
                Ok(record) => collection.records.push(record),
                Err(e) if self.policy == OnError::Skip && !e.is_fatal() => {
                    warn!("Skipping {}: {}", pair.sample.display(), e);
                    collection.skipped.push((pair.sample.clone(), e));
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            "Collected {} records ({} skipped)",
            collection.records.len(),
            collection.skipped.len()
        );
        Ok(collection)
    }

    pub fn enrich(&self, pair: &SamplePair) -> Result<Record> {
        let mut rec = record::load_metadata(&pair.metadata)?;
        rec.set(record::FILE_NAME, path_text(&pair.metadata));
        rec.set(record::ENERGY, sample::energy(self.samples, &pair.sample)?);

        let raw = self.detector.run(&DetectorRequest {
            params: self.params,
            sample: &pair.sample,
        })?;
        let output = DetectorOutput::parse(&raw, &pair.sample)?;
        rec.set(record::ENTROPY_HEX, output.score_hex);
        rec.set(record::START_WINDOW, output.window_hex);
        Ok(rec)
    }
}

fn path_text(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::detector::DetectorType;
    use crate::record::Scalar;
    use std::collections::HashMap;

    /// Canned detector output per sample path; unknown samples fail.
    pub(crate) struct FakeDetector {
        pub outputs: HashMap<PathBuf, Vec<u8>>,
    }

    impl Detector for FakeDetector {
        fn run(&self, request: &DetectorRequest<'_>) -> Result<Vec<u8>> {
            self.outputs
                .get(request.sample)
                .cloned()
                .ok_or_else(|| ScanError::DetectorExit {
                    path: request.sample.to_path_buf(),
                    status: "exit status: 1".to_string(),
                    stderr: "no such sample".to_string(),
                })
        }
    }

    pub(crate) struct FakeSamples {
        pub arrays: HashMap<PathBuf, Vec<f64>>,
    }

    impl SampleSource for FakeSamples {
        fn load(&self, path: &Path) -> Result<Vec<f64>> {
            self.arrays.get(path).cloned().ok_or_else(|| {
                ScanError::io(path, std::io::Error::from(std::io::ErrorKind::NotFound))
            })
        }
    }

    pub(crate) fn detector_bytes(score: &str) -> Vec<u8> {
        format!("{}\n0000000000000400\n", score).into_bytes()
    }

    pub(crate) fn params() -> ScanParams {
        ScanParams {
            detector_type: DetectorType::JensenShannon,
            geometry: 0,
            sweep: 250000,
            ranks: 1,
            out_format: 3,
        }
    }

    /// Writes a metadata file per `(name, score, values)` and returns the
    /// pairs with fakes that serve the given score and array for each.
    pub(crate) fn fixture(
        dir: &Path,
        samples: &[(&str, &str, Vec<f64>)],
    ) -> (Vec<SamplePair>, FakeDetector, FakeSamples) {
        let mut pairs = Vec::new();
        let mut outputs = HashMap::new();
        let mut arrays = HashMap::new();
        for (name, score, values) in samples {
            let metadata = dir.join(format!("{}.txt", name));
            std::fs::write(&metadata, format!("snr,{}\nlabel,{}\n", values.len(), name)).unwrap();
            let sample = dir.join(format!("{}.npy", name));
            outputs.insert(sample.clone(), detector_bytes(score));
            arrays.insert(sample.clone(), values.clone());
            pairs.push(SamplePair { sample, metadata });
        }
        (pairs, FakeDetector { outputs }, FakeSamples { arrays })
    }

    #[test]
    fn test_enrich_sets_pipeline_fields_after_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let (pairs, detector, samples) =
            fixture(dir.path(), &[("a", "FFFFFFFFFFFFFFFF", vec![2.0, 2.0])]);
        let params = params();
        let rec = Collector::new(&detector, &samples, &params, OnError::Abort)
            .enrich(&pairs[0])
            .unwrap();

        assert_eq!(
            rec.keys().collect::<Vec<_>>(),
            vec!["snr", "label", "file_name", "energy", "entropy_hex", "start_window"]
        );
        assert_eq!(rec.get("file_name"), Some(&Scalar::Text(pairs[0].metadata.display().to_string())));
        assert_eq!(rec.get("energy"), Some(&Scalar::Float(4.0)));
        assert_eq!(rec.get("entropy_hex"), Some(&Scalar::Text("FFFFFFFFFFFFFFFF".into())));
        assert_eq!(rec.get("start_window"), Some(&Scalar::Text("0000000000000400".into())));
    }

    #[test]
    fn test_collect_keeps_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let (pairs, detector, samples) = fixture(
            dir.path(),
            &[
                ("a", "FFFFFFFFFFFFFFFF", vec![2.0, 2.0]),
                ("b", "0000000000000000", vec![0.0, 0.0]),
            ],
        );
        let params = params();
        let collection = Collector::new(&detector, &samples, &params, OnError::Abort)
            .collect(&pairs)
            .unwrap();
        let labels: Vec<_> = collection
            .records
            .iter()
            .map(|r| r.get("label").cloned())
            .collect();
        assert_eq!(labels, vec![Some(Scalar::from("a")), Some(Scalar::from("b"))]);
        assert!(collection.skipped.is_empty());
    }

    #[test]
    fn test_abort_policy_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (pairs, mut detector, samples) = fixture(
            dir.path(),
            &[
                ("a", "FFFFFFFFFFFFFFFF", vec![1.0]),
                ("b", "0000000000000000", vec![1.0]),
            ],
        );
        detector.outputs.insert(pairs[0].sample.clone(), b"garbage".to_vec());
        let params = params();
        let err = Collector::new(&detector, &samples, &params, OnError::Abort)
            .collect(&pairs)
            .unwrap_err();
        assert!(matches!(err, ScanError::ShortOutput { ref path, .. } if *path == pairs[0].sample));
    }

    #[test]
    fn test_skip_policy_drops_only_failing_samples() {
        let dir = tempfile::tempdir().unwrap();
        let (pairs, mut detector, samples) = fixture(
            dir.path(),
            &[
                ("a", "FFFFFFFFFFFFFFFF", vec![1.0]),
                ("b", "0000000000000000", vec![]),
                ("c", "8000000000000000", vec![3.0]),
                ("d", "8000000000000000", vec![3.0]),
            ],
        );
        detector.outputs.remove(&pairs[0].sample);
        let params = params();
        let collection = Collector::new(&detector, &samples, &params, OnError::Skip)
            .collect(&pairs)
            .unwrap();

        assert_eq!(collection.records.len(), 2);
        assert_eq!(collection.skipped.len(), 2);
        assert!(matches!(collection.skipped[0].1, ScanError::DetectorExit { .. }));
        assert!(matches!(collection.skipped[1].1, ScanError::EmptySample(_)));
    }

    #[test]
    fn test_reserved_field_is_fatal_even_when_skipping() {
        let dir = tempfile::tempdir().unwrap();
        let (pairs, detector, samples) =
            fixture(dir.path(), &[("a", "FFFFFFFFFFFFFFFF", vec![1.0])]);
        std::fs::write(&pairs[0].metadata, "geometry,3\n").unwrap();
        let params = params();
        let err = Collector::new(&detector, &samples, &params, OnError::Skip)
            .collect(&pairs)
            .unwrap_err();
        assert!(matches!(err, ScanError::ReservedField { .. }));
    }
}
