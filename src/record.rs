use std::fmt;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::{Result, ScanError};

pub const FILE_NAME: &str = "file_name";
pub const ENERGY: &str = "energy";
pub const ENTROPY_HEX: &str = "entropy_hex";
pub const START_WINDOW: &str = "start_window";
pub const NORM_ENTROPY: &str = "norm_entropy";
pub const GEOMETRY: &str = "geometry";
pub const SWEEP_SIZE: &str = "sweep size (bytes)";

/// Field names written by the pipeline. Metadata files may not use them.
pub const RESERVED_FIELDS: [&str; 7] = [
    FILE_NAME,
    ENERGY,
    ENTROPY_HEX,
    START_WINDOW,
    NORM_ENTROPY,
    GEOMETRY,
    SWEEP_SIZE,
];

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Integer first, then float, otherwise the trimmed text. Words such as
    /// `inf` or `nan` stay text; a float needs at least one digit.
    pub fn infer(raw: &str) -> Self {
        let s = raw.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Scalar::Int(v);
        }
        if s.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(v) = s.parse::<f64>() {
                return Scalar::Float(v);
            }
        }
        Scalar::Text(s.to_string())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) if v.is_nan() => Ok(()),
            Scalar::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{:.1}", v)
            }
            Scalar::Float(v) if *v != 0.0 && (v.abs() < 1e-4 || v.abs() >= 1e16) => {
                write_exponent(f, *v)
            }
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Shortest digits with a signed exponent of at least two places, e.g. `1.5e-05`.
fn write_exponent(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    let sci = format!("{:e}", v);
    match sci.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            write!(f, "{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => f.write_str(&sci),
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

/// Ordered field map for one sample. Insertion order is column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Scalar)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Sets `key`, replacing an existing value in place or appending a new field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn reserved_key(&self) -> Option<&str> {
        self.keys().find(|k| RESERVED_FIELDS.contains(k))
    }
}

#[derive(Debug, Deserialize)]
struct MetadataLine {
    key: String,
    value: String,
}

/// Reads a `key,value` per line metadata file into a record.
pub fn load_metadata<P: AsRef<Path>>(path: P) -> Result<Record> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| metadata_error(path, e))?;

    let mut record = Record::new();
    for line in reader.deserialize::<MetadataLine>() {
        let line = line.map_err(|e| metadata_error(path, e))?;
        record.set(line.key, Scalar::infer(&line.value));
    }

    if let Some(field) = record.reserved_key() {
        return Err(ScanError::ReservedField {
            path: path.to_path_buf(),
            field: field.to_string(),
        });
    }

    debug!("Loaded {} metadata fields from {}", record.len(), path.display());
    Ok(record)
}

fn metadata_error(path: &Path, e: csv::Error) -> ScanError {
    let message = e.to_string();
    match e.into_kind() {
        csv::ErrorKind::Io(io) => ScanError::io(path, io),
        _ => ScanError::Metadata {
            path: path.to_path_buf(),
            message,
        },
    }
}
