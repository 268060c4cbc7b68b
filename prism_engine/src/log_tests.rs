//! Unit tests for log.rs
//!
//! Tests LogSeverity ordering, LogEntry construction and DefaultLogger formatting.

use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "prism::RingStageBuffer".to_string(),
        message: "staged 124 bytes".to_string(),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
    assert_eq!(LogSeverity::Error.label(), "ERROR");
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_format_entry_without_location() {
    let line = DefaultLogger::format_entry(&entry(LogSeverity::Info, None, None));
    assert!(line.contains("[INFO ]"));
    assert!(line.contains("[prism::RingStageBuffer]"));
    assert!(line.ends_with("staged 124 bytes"));
}

#[test]
fn test_format_entry_with_location() {
    let line = DefaultLogger::format_entry(&entry(LogSeverity::Error, Some("ring_stage_buffer.rs"), Some(42)));
    assert!(line.contains("[ERROR]"));
    assert!(line.ends_with("(ring_stage_buffer.rs:42)"));
}

#[test]
fn test_format_entry_timestamp_shape() {
    let line = DefaultLogger::format_entry(&entry(LogSeverity::Debug, None, None));
    // "[YYYY-MM-DD HH:MM:SS.mmm]"
    let close = line.find(']').unwrap();
    assert_eq!(close, 24);
    assert_eq!(&line[5..6], "-");
    assert_eq!(&line[20..21], ".");
}

#[test]
fn test_default_logger_min_severity() {
    let logger = DefaultLogger::new(LogSeverity::Warn);
    assert_eq!(logger.min_severity(), LogSeverity::Warn);
    // Filtered entries are dropped silently
    logger.log(&entry(LogSeverity::Trace, None, None));

    let default = DefaultLogger::default();
    assert!(default.min_severity() <= LogSeverity::Info);
}
