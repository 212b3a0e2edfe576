//! Raw `[MM:SS] text` transcript to timestamped segments.

use tracing::debug;
use vingest_models::{parse_mmss, TranscriptSegment};

/// Parse a raw transcript into segments, in file order.
///
/// Lines without a leading bracketed timestamp, or whose timestamp does not
/// parse, are dropped.
pub fn normalize(raw: &str) -> Vec<TranscriptSegment> {
    raw.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<TranscriptSegment> {
    let rest = line.trim().strip_prefix('[')?;
    let (timestamp, text) = rest.split_once(']')?;

    match parse_mmss(timestamp) {
        Ok(seconds) => Some(TranscriptSegment {
            timestamp: timestamp.to_string(),
            seconds,
            text: text.trim().to_string(),
        }),
        Err(e) => {
            debug!(line = %line, error = %e, "Skipping transcript line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_timestamped_lines() {
        let segments = normalize("[00:00] Previously on\n[01:05] hello\n");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].timestamp, "01:05");
        assert_eq!(segments[1].seconds, 65);
        assert_eq!(segments[1].text, "hello");
    }

    #[test]
    fn test_drops_malformed_lines() {
        let raw = "WEBVTT\n\n[ab:cd] nope\n[02:10]   spaced out  \nno brackets 00:10\n[03:00 missing close\n[120:00] long video";
        let segments = normalize(raw);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].seconds, 130);
        assert_eq!(segments[0].text, "spaced out");
        assert_eq!(segments[1].seconds, 7200);
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize("").is_empty());
    }
}
