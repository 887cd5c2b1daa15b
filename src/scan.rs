use std::path::PathBuf;

use crate::api::config::OnError;
use crate::api::detector::{Detector, ScanParams};
use crate::api::store::ResultStore;
use crate::collector::Collector;
use crate::discovery::SamplePair;
use crate::error::{Result, ScanError};
use crate::merger::{self, RunStamp};
use crate::sample::SampleSource;
use crate::table::Table;

#[derive(Debug)]
pub struct ScanOutcome {
    /// The full table as saved.
    pub table: Table,
    pub added: usize,
    pub skipped: Vec<(PathBuf, ScanError)>,
}

/// Collects every pair, then merges the batch into `store`. The store is
/// only written once collection has finished without a fatal error.
pub fn run_scan<D, S, St>(
    pairs: &[SamplePair],
    detector: &D,
    samples: &S,
    params: &ScanParams,
    policy: OnError,
    store: &mut St,
) -> Result<ScanOutcome>
where
    D: Detector + ?Sized,
    S: SampleSource + ?Sized,
    St: ResultStore + ?Sized,
{
    let collection = Collector::new(detector, samples, params, policy).collect(pairs)?;
    let added = collection.records.len();
    let batch = merger::prepare_batch(
        collection.records,
        RunStamp {
            geometry: params.geometry,
            sweep: params.sweep,
        },
    )?;
    let table = merger::merge_into(store, batch)?;
    Ok(ScanOutcome {
        table,
        added,
        skipped: collection.skipped,
    })
}
