//! Detector stdout layout.
//!
//! ```text
//! [0, 16)   score, 16 ASCII hex digits (u64)
//! [16]      separator, ignored
//! [17, 33)  start window marker, 16 ASCII hex digits
//! [33, ..)  further ranked matches, ignored
//! ```

use std::path::Path;

use crate::error::{Result, ScanError};

pub const SCORE: std::ops::Range<usize> = 0..16;
pub const WINDOW: std::ops::Range<usize> = 17..33;
pub const MIN_LEN: usize = WINDOW.end;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorOutput {
    pub score_hex: String,
    pub window_hex: String,
}

impl DetectorOutput {
    /// Decodes the fixed-offset fields of `raw`. `path` is the sample the
    /// output belongs to, used for error reporting.
    pub fn parse(raw: &[u8], path: &Path) -> Result<Self> {
        if raw.len() < MIN_LEN {
            return Err(ScanError::ShortOutput {
                path: path.to_path_buf(),
                len: raw.len(),
                expected: MIN_LEN,
            });
        }
        Ok(Self {
            score_hex: hex_field("entropy_hex", &raw[SCORE])?,
            window_hex: hex_field("start_window", &raw[WINDOW])?,
        })
    }

    pub fn score(&self) -> Result<u64> {
        parse_hex("entropy_hex", &self.score_hex)
    }
}

fn hex_field(field: &str, bytes: &[u8]) -> Result<String> {
    if bytes.iter().all(u8::is_ascii_hexdigit) {
        Ok(bytes.iter().map(|&b| b as char).collect())
    } else {
        Err(ScanError::MalformedHex {
            field: field.to_string(),
            value: String::from_utf8_lossy(bytes).into_owned(),
        })
    }
}

/// Parses exactly 16 hex digits into a `u64`.
pub fn parse_hex(field: &str, text: &str) -> Result<u64> {
    let malformed = || ScanError::MalformedHex {
        field: field.to_string(),
        value: text.to_string(),
    };
    if text.len() != 16 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed());
    }
    u64::from_str_radix(text, 16).map_err(|_| malformed())
}

/// Rescales a raw 64-bit score to `[0, 1]` as `score / (2^64 - 1)`,
/// correctly rounded.
///
/// The score is shifted so the 128-bit integer quotient carries at least 63
/// significant bits; a nonzero remainder is folded into the lowest bit so the
/// single rounding to `f64` sees it. The power-of-two rescale is exact.
pub fn normalize_score(score: u64) -> f64 {
    if score == 0 {
        return 0.0;
    }
    let shift = 64 + score.leading_zeros();
    let numerator = (score as u128) << shift;
    let divisor = u64::MAX as u128;
    let mut quotient = numerator / divisor;
    if numerator % divisor != 0 {
        quotient |= 1;
    }
    quotient as f64 * f64::from_bits((1023 - shift as u64) << 52)
}
