//! Turns a collected batch into table rows and appends them to a store.

use log::info;

use crate::api::store::ResultStore;
use crate::error::{Result, ScanError};
use crate::output::{normalize_score, parse_hex};
use crate::record::{self, Record, Scalar};
use crate::table::Table;

/// Run parameters broadcast to every row of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStamp {
    pub geometry: i64,
    pub sweep: u64,
}

/// Adds `norm_entropy`, `geometry` and `sweep size (bytes)` to every record
/// and lays the batch out as a table indexed from 0 in batch order.
pub fn prepare_batch(mut records: Vec<Record>, stamp: RunStamp) -> Result<Table> {
    let sweep = i64::try_from(stamp.sweep)
        .map_err(|_| ScanError::Config(format!("sweep size {} is too large", stamp.sweep)))?;
    for rec in &mut records {
        let norm = norm_entropy(rec)?;
        rec.set(record::NORM_ENTROPY, norm);
        rec.set(record::GEOMETRY, stamp.geometry);
        rec.set(record::SWEEP_SIZE, sweep);
    }
    Ok(Table::from_records(&records))
}

/// `entropy_hex` scaled into `[0, 1]`.
pub fn norm_entropy(rec: &Record) -> Result<f64> {
    let hex = rec
        .get(record::ENTROPY_HEX)
        .and_then(Scalar::as_text)
        .ok_or_else(|| ScanError::MalformedHex {
            field: record::ENTROPY_HEX.to_string(),
            value: rec
                .get(record::ENTROPY_HEX)
                .map(|v| v.to_string())
                .unwrap_or_default(),
        })?;
    Ok(normalize_score(parse_hex(record::ENTROPY_HEX, hex)?))
}

/// Appends `batch` after the stored rows and saves the result, which is
/// also returned.
pub fn merge_into<S: ResultStore + ?Sized>(store: &mut S, batch: Table) -> Result<Table> {
    let mut table = store.load()?;
    let existing = table.len();
    let added = batch.len();
    table.append(batch);
    store.save(&table)?;
    info!("Merged {} new rows after {} existing rows", added, existing);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::store::{CsvStore, MemoryStore};

    fn scored(label: &str, hex: &str) -> Record {
        let mut r = Record::new();
        r.set("label", label);
        r.set(record::ENTROPY_HEX, hex);
        r
    }

    fn stamp() -> RunStamp {
        RunStamp {
            geometry: 0,
            sweep: 250000,
        }
    }

    fn labels(table: &Table) -> Vec<String> {
        table
            .column("label")
            .unwrap()
            .into_iter()
            .map(|v| v.map(|s| s.to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_norm_entropy_values() {
        let batch = prepare_batch(
            vec![
                scored("max", "FFFFFFFFFFFFFFFF"),
                scored("zero", "0000000000000000"),
                scored("half", "8000000000000000"),
            ],
            stamp(),
        )
        .unwrap();
        let norms: Vec<_> = batch
            .column(record::NORM_ENTROPY)
            .unwrap()
            .into_iter()
            .map(|v| v.and_then(Scalar::as_f64).unwrap())
            .collect();
        assert_eq!(norms, vec![1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_norm_entropy_rejects_bad_hex() {
        let err = prepare_batch(vec![scored("bad", "b'FFFFFFFFFFFFF")], stamp()).unwrap_err();
        assert!(matches!(err, ScanError::MalformedHex { .. }));

        let mut missing = Record::new();
        missing.set("label", "none");
        assert!(norm_entropy(&missing).is_err());
    }

    #[test]
    fn test_broadcast_geometry_and_sweep() {
        let mut rec = scored("a", "0000000000000001");
        rec.set("geometry_hint", 9i64);
        let batch = prepare_batch(
            vec![rec, scored("b", "0000000000000002")],
            RunStamp {
                geometry: 5,
                sweep: 1000,
            },
        )
        .unwrap();
        for row in 0..batch.len() {
            assert_eq!(batch.get(row, record::GEOMETRY), Some(&Scalar::Int(5)));
            assert_eq!(batch.get(row, record::SWEEP_SIZE), Some(&Scalar::Int(1000)));
        }
    }

    #[test]
    fn test_oversized_sweep_is_rejected() {
        let stamp = RunStamp {
            geometry: 0,
            sweep: i64::MAX as u64 + 1,
        };
        let err = prepare_batch(vec![scored("a", "0000000000000000")], stamp).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[test]
    fn test_append_order() {
        let mut store = MemoryStore::default();
        let b1 = prepare_batch(vec![scored("a", "0000000000000000"), scored("b", "0000000000000000")], stamp()).unwrap();
        let b2 = prepare_batch(vec![scored("c", "FFFFFFFFFFFFFFFF")], stamp()).unwrap();
        merge_into(&mut store, b1).unwrap();
        let merged = merge_into(&mut store, b2).unwrap();
        assert_eq!(labels(&merged), vec!["a", "b", "c"]);
        assert_eq!(store.table(), &merged);
    }

    #[test]
    fn test_empty_batch_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j_results.csv");
        let mut store = CsvStore::new(&path);
        merge_into(&mut store, prepare_batch(vec![scored("a", "8000000000000000")], stamp()).unwrap()).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let merged = merge_into(&mut store, prepare_batch(Vec::new(), stamp()).unwrap()).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_column_union_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j_results.csv");
        let mut store = CsvStore::new(&path);
        merge_into(&mut store, prepare_batch(vec![scored("a", "0000000000000000")], stamp()).unwrap()).unwrap();

        let mut rec = scored("b", "FFFFFFFFFFFFFFFF");
        rec.set("needle", "sine");
        let merged = merge_into(&mut store, prepare_batch(vec![rec], stamp()).unwrap()).unwrap();

        assert_eq!(merged.columns().last().map(String::as_str), Some("needle"));
        assert_eq!(merged.get(0, "needle"), None);
        assert_eq!(merged.get(1, "needle"), Some(&Scalar::Text("sine".into())));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            ",label,entropy_hex,norm_entropy,geometry,sweep size (bytes),needle\n\
             0,a,0000000000000000,0.0,0,250000,\n\
             1,b,FFFFFFFFFFFFFFFF,1.0,0,250000,sine\n"
        );
    }
}
