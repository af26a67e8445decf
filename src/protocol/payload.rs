//! JSON payload documents carried inside frames.
//!
//! Field names follow the wire format (camelCase), enum values are
//! SCREAMING_SNAKE_CASE.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Requests
// ============================================================================

/// LOGIN request body.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Account name.
    pub username: String,
    /// Password-derived secret, opaque to the protocol.
    pub password: String,
    /// Register this connection for `FILES_HISTORY_REPORT` pushes.
    #[serde(default)]
    pub subscribe_on_downloading_files_report: bool,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field(
                "subscribe_on_downloading_files_report",
                &self.subscribe_on_downloading_files_report,
            )
            .finish()
    }
}

/// DOWNLOAD_URL request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlRequest {
    /// HTTP(S) URL to fetch.
    pub url: String,
    /// Name of the file to create.
    pub file_name: String,
    /// Target folder relative to the download root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// GET_FILES_HISTORY request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetFilesHistoryRequest {
    /// Index of the first record.
    #[serde(default)]
    pub offset: u32,
    /// Page size, 1..=100.
    pub size: u32,
}

/// Body for DELETE_FILE, STOP_DOWNLOADING and RESUME_DOWNLOADING.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIdRequest {
    /// Server-side file id.
    pub file_id: String,
}

/// LIST_FOLDERS request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFoldersRequest {
    /// Folder to list, `None` for the download root.
    #[serde(default)]
    pub path: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Download state of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    /// Transfer in progress.
    Downloading,
    /// Transfer complete.
    Downloaded,
    /// Transfer stopped by the user.
    Paused,
    /// Transfer failed.
    Error,
}

/// One file in the download history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Server-side file id.
    pub id: String,
    /// File name on disk.
    pub name: String,
    /// Current status.
    pub status: FileStatus,
    /// Expected size, 0 when unknown.
    #[serde(default)]
    pub total_bytes: u64,
    /// Bytes written so far.
    #[serde(default)]
    pub downloaded_bytes: u64,
    /// Current transfer speed.
    #[serde(default, rename = "speedBytesPerMS")]
    pub speed_bytes_per_ms: u64,
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Records in this page.
    pub content: Vec<T>,
    /// Total number of records across all pages.
    pub total_elements: u64,
}

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderEntry {
    /// `true` for a directory.
    pub folder: bool,
    /// Entry name.
    pub file_name: String,
}

/// LIST_FOLDERS response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFoldersResponse {
    /// Whether files may be downloaded into the listed folder.
    pub can_download: bool,
    /// Folder contents.
    pub files: Vec<FolderEntry>,
}

// ============================================================================
// Events
// ============================================================================

/// FILES_HISTORY_REPORT event body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilesHistoryReport {
    /// Files that are downloading or changed since the last report.
    pub files: Vec<FileRecord>,
}

// ============================================================================
// Errors
// ============================================================================

/// Enumerated error kind carried in ERROR frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Command code not handled by the server.
    UnknownCommand,
    /// Download could not be started or resumed.
    FailedToDownload,
    /// Referenced file does not exist for this user.
    NotFound,
    /// LOGIN rejected.
    IncorrectCredentials,
    /// Command sent before LOGIN.
    NotAuthenticated,
    /// LOGIN sent on an authenticated connection.
    AlreadyAuthenticated,
    /// Request body failed validation.
    Validation,
    /// Unclassified failure. Also used for kinds this build does not know.
    #[serde(other)]
    Unknown,
}

impl ErrorKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::FailedToDownload => "FAILED_TO_DOWNLOAD",
            Self::NotFound => "NOT_FOUND",
            Self::IncorrectCredentials => "INCORRECT_CREDENTIALS",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::AlreadyAuthenticated => "ALREADY_AUTHENTICATED",
            Self::Validation => "VALIDATION",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an ERROR frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error kind.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
}

impl ServerError {
    /// Creates an error body.
    #[inline]
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a validation error.
    #[inline]
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Shorthand for a not found error.
    #[inline]
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// The standard LOGIN rejection.
    #[inline]
    #[must_use]
    pub fn incorrect_credentials() -> Self {
        Self::new(ErrorKind::IncorrectCredentials, "Incorrect username or password.")
    }

    /// Shorthand for a download failure.
    #[inline]
    #[must_use]
    pub fn failed_to_download(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FailedToDownload, message)
    }

    /// Shorthand for an unclassified error.
    #[inline]
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// ============================================================================
// Tests
// ============================================================================
