//! Sample arrays and the power estimate taken from them.
//!
//! Samples are NumPy `.npy` files (format 1.0, 2.0 or 3.0) holding a single
//! array of booleans, integers or floats in any shape. Only the flattened
//! element values matter here.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use crate::error::{Result, ScanError};

const MAGIC: &[u8] = b"\x93NUMPY";

/// Source of the numeric values behind a sample file.
pub trait SampleSource {
    fn load(&self, path: &Path) -> Result<Vec<f64>>;
}

/// Reads `.npy` files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NpyLoader;

impl SampleSource for NpyLoader {
    fn load(&self, path: &Path) -> Result<Vec<f64>> {
        let file = File::open(path).map_err(|e| ScanError::io(path, e))?;
        let mut buf = Vec::new();
        BufReader::new(file)
            .read_to_end(&mut buf)
            .map_err(|e| ScanError::io(path, e))?;
        let values = decode_npy(&buf).map_err(|message| ScanError::UnsupportedArray {
            path: path.to_path_buf(),
            message,
        })?;
        debug!("Loaded {} values from {}", values.len(), path.display());
        Ok(values)
    }
}

/// Mean of the elementwise square. `None` for an empty array.
pub fn mean_square(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64)
}

/// Loads `path` through `source` and returns its mean power.
pub fn energy<S: SampleSource + ?Sized>(source: &S, path: &Path) -> Result<f64> {
    let values = source.load(path)?;
    mean_square(&values).ok_or_else(|| ScanError::EmptySample(path.to_path_buf()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Int,
    Uint,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dtype {
    kind: Kind,
    size: usize,
    big_endian: bool,
}

impl Dtype {
    fn parse(descr: &str) -> std::result::Result<Self, String> {
        let mut chars = descr.chars();
        let (big_endian, rest) = match chars.next() {
            Some('<') | Some('|') => (false, chars.as_str()),
            Some('>') => (true, chars.as_str()),
            Some('=') => (cfg!(target_endian = "big"), chars.as_str()),
            _ => (cfg!(target_endian = "big"), descr),
        };
        let mut rest_chars = rest.chars();
        let kind = match rest_chars.next() {
            Some('b') => Kind::Bool,
            Some('i') => Kind::Int,
            Some('u') => Kind::Uint,
            Some('f') => Kind::Float,
            _ => return Err(format!("unsupported dtype '{}'", descr)),
        };
        let size: usize = rest_chars
            .as_str()
            .parse()
            .map_err(|_| format!("unsupported dtype '{}'", descr))?;
        let valid = match kind {
            Kind::Bool => size == 1,
            Kind::Int | Kind::Uint => matches!(size, 1 | 2 | 4 | 8),
            Kind::Float => matches!(size, 4 | 8),
        };
        if !valid {
            return Err(format!("unsupported dtype '{}'", descr));
        }
        Ok(Self {
            kind,
            size,
            big_endian,
        })
    }

    fn read(&self, bytes: &[u8]) -> f64 {
        let mut raw = [0u8; 8];
        if self.big_endian {
            raw[8 - self.size..].copy_from_slice(bytes);
            raw.reverse();
        } else {
            raw[..self.size].copy_from_slice(bytes);
        }
        let bits = u64::from_le_bytes(raw);
        match (self.kind, self.size) {
            (Kind::Bool, _) => (bits != 0) as u8 as f64,
            (Kind::Uint, _) => bits as f64,
            (Kind::Int, 1) => bits as u8 as i8 as f64,
            (Kind::Int, 2) => bits as u16 as i16 as f64,
            (Kind::Int, 4) => bits as u32 as i32 as f64,
            (Kind::Int, _) => bits as i64 as f64,
            (Kind::Float, 4) => f32::from_bits(bits as u32) as f64,
            (Kind::Float, _) => f64::from_bits(bits),
        }
    }
}

fn decode_npy(buf: &[u8]) -> std::result::Result<Vec<f64>, String> {
    if buf.len() < 10 || &buf[..6] != MAGIC {
        return Err("not an .npy file".to_string());
    }
    let major = buf[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([buf[8], buf[9]]) as usize, 10),
        2 | 3 => {
            if buf.len() < 12 {
                return Err("truncated header".to_string());
            }
            (
                u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize,
                12,
            )
        }
        v => return Err(format!("unsupported format version {}", v)),
    };
    let data_start = header_start + header_len;
    let header = buf
        .get(header_start..data_start)
        .ok_or_else(|| "truncated header".to_string())?;
    let header = std::str::from_utf8(header).map_err(|_| "header is not text".to_string())?;

    let descr = header_value(header, "descr")
        .map(|v| v.trim_matches(|c| c == '\'' || c == '"'))
        .ok_or_else(|| "header has no 'descr'".to_string())?;
    let dtype = Dtype::parse(descr)?;
    let shape = header_value(header, "shape").ok_or_else(|| "header has no 'shape'".to_string())?;
    let count = element_count(shape)?;

    let data = &buf[data_start..];
    let needed = count
        .checked_mul(dtype.size)
        .ok_or_else(|| "array too large".to_string())?;
    if data.len() < needed {
        return Err(format!(
            "expected {} bytes of data, found {}",
            needed,
            data.len()
        ));
    }

    Ok(data[..needed]
        .chunks_exact(dtype.size)
        .map(|chunk| dtype.read(chunk))
        .collect())
}

/// Raw text of `key`'s value in the header's Python dict literal.
fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let quoted = [format!("'{}'", key), format!("\"{}\"", key)];
    let pos = quoted.iter().find_map(|q| header.find(q.as_str()).map(|p| p + q.len()))?;
    let rest = header[pos..].trim_start().strip_prefix(':')?.trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find(',').unwrap_or(rest.len())
    };
    Some(rest[..end].trim())
}

fn element_count(shape: &str) -> std::result::Result<usize, String> {
    let inner = shape
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format!("malformed shape {}", shape))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .try_fold(1usize, |acc, dim| {
            let d: usize = dim.parse().map_err(|_| format!("malformed shape {}", shape))?;
            acc.checked_mul(d).ok_or_else(|| "array too large".to_string())
        })
}

/// Serializes `values` as a version 1.0 little-endian `<f8` array.
#[cfg(test)]
pub(crate) fn encode_npy_f64(values: &[f64]) -> Vec<u8> {
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    encode_npy("<f8", &format!("({},)", values.len()), &data)
}

#[cfg(test)]
pub(crate) fn encode_npy(descr: &str, shape: &str, data: &[u8]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr, shape
    );
    while (MAGIC.len() + 4 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');
    let mut out = MAGIC.to_vec();
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(data);
    out
}
