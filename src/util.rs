use crate::api::config::OnError;
use crate::api::detector::DetectorType;

pub fn detector_type_parser(s: &str) -> Result<DetectorType, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Detector type cannot be empty".to_string());
    }
    DetectorType::from_code(s).ok_or_else(|| {
        format!(
            "Invalid detector type '{}': use j (Jensen-Shannon exodivergence), i (Leidich exodivergence), x (exoelasticity) or a",
            s
        )
    })
}

/// Sweep window in bytes; must be positive and fit a signed 64-bit cell.
pub fn sweep_parser(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let sweep: u64 = s
        .replace('_', "")
        .parse()
        .map_err(|_| format!("Invalid sweep size: {}", s))?;
    if sweep == 0 {
        return Err("Sweep size must be greater than zero".to_string());
    }
    if sweep > i64::MAX as u64 {
        return Err(format!("Sweep size cannot exceed {}", i64::MAX));
    }
    Ok(sweep)
}

pub fn policy_parser(s: &str) -> Result<OnError, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_type_parser() {
        assert_eq!(detector_type_parser("j"), Ok(DetectorType::JensenShannon));
        assert_eq!(detector_type_parser(" i "), Ok(DetectorType::Leidich));
        assert_eq!(detector_type_parser("x"), Ok(DetectorType::Exoelasticity));
        assert_eq!(detector_type_parser("a"), Ok(DetectorType::A));
        assert!(detector_type_parser("").is_err());
        assert!(detector_type_parser("J").is_err());
    }

    #[test]
    fn test_sweep_parser() {
        assert_eq!(sweep_parser("250000"), Ok(250000));
        assert_eq!(sweep_parser("250_000"), Ok(250000));
        assert!(sweep_parser("0").is_err());
        assert!(sweep_parser("-5").is_err());
        assert!(sweep_parser("big").is_err());
        assert_eq!(sweep_parser("9223372036854775807"), Ok(i64::MAX as u64));
        assert!(sweep_parser("9223372036854775808").is_err());
        assert!(sweep_parser("18446744073709551615").is_err());
    }

    #[test]
    fn test_policy_parser() {
        assert_eq!(policy_parser("skip"), Ok(OnError::Skip));
        assert_eq!(policy_parser("abort"), Ok(OnError::Abort));
        assert!(policy_parser("ignore").is_err());
    }
}
