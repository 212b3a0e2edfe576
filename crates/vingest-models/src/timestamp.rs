//! `MM:SS` timestamp helpers.
//!
//! Transcript lines and frame descriptions carry offsets as `MM:SS` where
//! `MM` is total minutes (it may exceed 59 and grow past two digits).

use thiserror::Error;

/// Errors from parsing an `MM:SS` timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("Timestamp is empty")]
    Empty,

    #[error("Invalid timestamp format: {0}")]
    InvalidFormat(String),

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),
}

/// Parse `MM:SS` into total seconds.
///
/// # Examples
/// ```
/// use vingest_models::timestamp::parse_mmss;
/// assert_eq!(parse_mmss("01:05").unwrap(), 65);
/// assert_eq!(parse_mmss("75:00").unwrap(), 4500);
/// ```
pub fn parse_mmss(ts: &str) -> Result<u64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let (minutes, seconds) = ts
        .split_once(':')
        .ok_or_else(|| TimestampError::InvalidFormat(ts.to_string()))?;

    let minutes: u64 = minutes
        .trim()
        .parse()
        .map_err(|_| TimestampError::InvalidValue("minutes", minutes.to_string()))?;
    let seconds: u64 = seconds
        .trim()
        .parse()
        .map_err(|_| TimestampError::InvalidValue("seconds", seconds.to_string()))?;

    Ok(minutes * 60 + seconds)
}

/// Format total seconds as `MM:SS`.
pub fn format_mmss(total_secs: u64) -> String {
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mmss() {
        assert_eq!(parse_mmss("00:00").unwrap(), 0);
        assert_eq!(parse_mmss("01:05").unwrap(), 65);
        assert_eq!(parse_mmss(" 125:30 ").unwrap(), 7530);

        assert_eq!(parse_mmss(""), Err(TimestampError::Empty));
        assert!(matches!(parse_mmss("0105"), Err(TimestampError::InvalidFormat(_))));
        assert!(matches!(parse_mmss("aa:05"), Err(TimestampError::InvalidValue("minutes", _))));
        assert!(matches!(parse_mmss("01:2:3"), Err(TimestampError::InvalidValue("seconds", _))));
    }

    #[test]
    fn test_format_mmss() {
        assert_eq!(format_mmss(0), "00:00");
        assert_eq!(format_mmss(65), "01:05");
        assert_eq!(format_mmss(3600), "60:00");
        assert_eq!(format_mmss(6005), "100:05");
    }
}
