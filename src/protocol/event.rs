//! Event message types.
//!
//! Events are frames pushed by the server with request id `0`. They are not
//! correlated to any client request and are delivered to the session's
//! event handler.
//!
//! # Event Types
//!
//! | Command | Body |
//! |---------|------|
//! | `FILES_HISTORY_REPORT` | [`FilesHistoryReport`] |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::identifiers::RequestId;

use super::payload::FilesHistoryReport;
use super::{CommandCode, Frame};

// ============================================================================
// ServerEvent
// ============================================================================

/// A server-initiated event.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEvent {
    /// Raw command code of the event frame.
    pub command: u16,
    /// Parsed JSON body.
    pub body: Value,
}

impl ServerEvent {
    /// Builds an event from a decoded frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`](crate::Error::MalformedFrame) if the
    /// body is not UTF-8 JSON.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Ok(Self {
            command: frame.command,
            body: frame.body()?,
        })
    }

    /// Builds the frame pushing a files history report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn files_history_report(report: &FilesHistoryReport) -> Result<Frame> {
        Frame::with_body(RequestId::EVENT, CommandCode::FilesHistoryReport, report)
    }

    /// Returns the command if it is a known code.
    #[inline]
    #[must_use]
    pub fn command_code(&self) -> Option<CommandCode> {
        CommandCode::from_code(self.command)
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.command_code() {
            Some(CommandCode::FilesHistoryReport) => {
                match serde_json::from_value::<FilesHistoryReport>(self.body.clone()) {
                    Ok(report) => ParsedEvent::FilesHistoryReport(report),
                    Err(e) => {
                        debug!(error = %e, "Unparseable files history report");
                        self.unknown()
                    }
                }
            }
            _ => self.unknown(),
        }
    }

    fn unknown(&self) -> ParsedEvent {
        ParsedEvent::Unknown {
            command: self.command,
            body: self.body.clone(),
        }
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Typed server event.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// Progress of downloading and recently changed files.
    FilesHistoryReport(FilesHistoryReport),
    /// Event this build does not understand.
    Unknown {
        /// Raw command code.
        command: u16,
        /// Raw body.
        body: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::{FileRecord, FileStatus};

    #[test]
    fn test_parse_files_history_report() {
        let frame = Frame::new(
            RequestId::EVENT,
            CommandCode::FilesHistoryReport,
            br#"{"files":[{"id":"f1","name":"a.txt","status":"DOWNLOADING",
                 "totalBytes":10,"downloadedBytes":5,"speedBytesPerMS":1}]}"#
                .to_vec(),
        );
        let event = ServerEvent::from_frame(&frame).unwrap();

        match event.parse() {
            ParsedEvent::FilesHistoryReport(report) => {
                assert_eq!(report.files.len(), 1);
                assert_eq!(report.files[0].status, FileStatus::Downloading);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_command() {
        let event = ServerEvent {
            command: 77,
            body: json!({ "x": 1 }),
        };
        assert_eq!(
            event.parse(),
            ParsedEvent::Unknown {
                command: 77,
                body: json!({ "x": 1 })
            }
        );
    }

    #[test]
    fn test_bad_report_body_is_unknown() {
        let event = ServerEvent {
            command: CommandCode::FilesHistoryReport.code(),
            body: json!({ "files": "nope" }),
        };
        assert!(matches!(event.parse(), ParsedEvent::Unknown { command: 3, .. }));
    }

    #[test]
    fn test_report_frame() {
        let report = FilesHistoryReport {
            files: vec![FileRecord {
                id: "f1".into(),
                name: "a.txt".into(),
                status: FileStatus::Paused,
                total_bytes: 1,
                downloaded_bytes: 0,
                speed_bytes_per_ms: 0,
            }],
        };
        let frame = ServerEvent::files_history_report(&report).unwrap();
        assert!(frame.is_event());
        assert_eq!(frame.command_code(), Some(CommandCode::FilesHistoryReport));

        let parsed = ServerEvent::from_frame(&frame).unwrap().parse();
        assert_eq!(parsed, ParsedEvent::FilesHistoryReport(report));
    }
}
