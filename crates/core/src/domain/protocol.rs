//! Worker output protocol.
//!
//! Workers report on stdout, one message per line:
//!
//! ```text
//! PROGRESS:45
//! METRICS:{"processing_time":"1:30","style_match":82,"colors_analyzed":1200,"output_size":"12MB"}
//! ```
//!
//! Every other line is incidental log output. Parsing is pure and holds no
//! state between calls.

use crate::domain::job::JobMetrics;
use thiserror::Error;

pub const PROGRESS_PREFIX: &str = "PROGRESS:";
pub const METRICS_PREFIX: &str = "METRICS:";

/// Event carried by a single worker output line
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Percent complete, 0-100
    Progress(u8),
    /// Final result payload
    Metrics(JobMetrics),
    /// Anything else
    Log,
}

/// A `METRICS:` line whose payload is unusable: invalid JSON, not an object,
/// or missing one of the named metrics fields
#[derive(Error, Debug)]
pub enum ProtocolParseError {
    #[error("Malformed METRICS payload: {0}")]
    MalformedMetrics(#[from] serde_json::Error),

    #[error("METRICS payload is not a JSON object")]
    NotAnObject,
}

/// Classify one line of worker stdout
pub fn parse_line(line: &str) -> Result<WorkerEvent, ProtocolParseError> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
        return Ok(match rest.trim().parse::<u8>() {
            Ok(percent) if percent <= 100 => WorkerEvent::Progress(percent),
            _ => WorkerEvent::Log,
        });
    }

    if let Some(rest) = line.strip_prefix(METRICS_PREFIX) {
        let value: serde_json::Value = serde_json::from_str(rest.trim())?;
        if !value.is_object() {
            return Err(ProtocolParseError::NotAnObject);
        }
        let metrics: JobMetrics = serde_json::from_value(value)?;
        return Ok(WorkerEvent::Metrics(metrics));
    }

    Ok(WorkerEvent::Log)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line() {
        assert_eq!(parse_line("PROGRESS:45").unwrap(), WorkerEvent::Progress(45));
        assert_eq!(parse_line("PROGRESS:0").unwrap(), WorkerEvent::Progress(0));
        assert_eq!(
            parse_line("  PROGRESS:100\r").unwrap(),
            WorkerEvent::Progress(100)
        );
    }

    #[test]
    fn test_progress_out_of_range_is_log() {
        assert_eq!(parse_line("PROGRESS:101").unwrap(), WorkerEvent::Log);
        assert_eq!(parse_line("PROGRESS:-5").unwrap(), WorkerEvent::Log);
        assert_eq!(parse_line("PROGRESS:abc").unwrap(), WorkerEvent::Log);
        assert_eq!(parse_line("PROGRESS:").unwrap(), WorkerEvent::Log);
    }

    #[test]
    fn test_metrics_line() {
        let event = parse_line(
            r#"METRICS:{"processing_time":"1:30","style_match":82,"colors_analyzed":1200,"output_size":"12MB"}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            WorkerEvent::Metrics(JobMetrics::new("1:30", 82u32, 1200u32, "12MB"))
        );
    }

    #[test]
    fn test_metrics_without_named_fields_is_error() {
        for line in [
            "METRICS:{}",
            r#"METRICS:{"unrelated":1}"#,
            r#"METRICS:{"output_size":"12MB"}"#,
        ] {
            assert!(
                matches!(parse_line(line), Err(ProtocolParseError::MalformedMetrics(_))),
                "{}",
                line
            );
        }
    }

    #[test]
    fn test_malformed_metrics_is_error_not_panic() {
        let result = parse_line("METRICS:{not json");
        assert!(matches!(result, Err(ProtocolParseError::MalformedMetrics(_))));

        let result = parse_line(r#"METRICS:{"style_match":"high"}"#);
        assert!(matches!(result, Err(ProtocolParseError::MalformedMetrics(_))));
    }

    #[test]
    fn test_metrics_must_be_object() {
        let result = parse_line(r#"METRICS:["1:30", 82, 1200, "12MB"]"#);
        assert!(matches!(result, Err(ProtocolParseError::NotAnObject)));
    }

    #[test]
    fn test_other_lines_are_log() {
        assert_eq!(parse_line("Analyzing colors...").unwrap(), WorkerEvent::Log);
        assert_eq!(parse_line("").unwrap(), WorkerEvent::Log);
        assert_eq!(
            parse_line("progress:10 (lowercase is not protocol)").unwrap(),
            WorkerEvent::Log
        );
    }
}
