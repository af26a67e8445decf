//! Binary protocol message types.
//!
//! This module defines the wire format shared by client and server.
//!
//! # Protocol Overview
//!
//! | Message Type | Request id | Direction | Purpose |
//! |--------------|------------|-----------|---------|
//! | Request | 1.. | Client → Server | Command request |
//! | Response | echoed | Server → Client | Command result or ERROR |
//! | Event | 0 | Server → Client | Pushed notification |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command code enumeration |
//! | `frame` | Binary frame codec |
//! | `payload` | JSON bodies |
//! | `request` | Typed requests and correlated responses |
//! | `event` | Server events |
//! | `validation` | Request body rules |

// ============================================================================
// Submodules
// ============================================================================

/// Command code enumeration.
pub mod command;

/// Server event message types.
pub mod event;

/// Binary frame codec.
pub mod frame;

/// JSON payload documents.
pub mod payload;

/// Request and Response message types.
pub mod request;

/// Request body validation.
pub mod validation;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::CommandCode;
pub use event::{ParsedEvent, ServerEvent};
pub use frame::{Frame, HEADER_SIZE, decode, encode, json_payload};
pub use payload::{
    DownloadUrlRequest, ErrorKind, FileIdRequest, FileRecord, FileStatus, FilesHistoryReport,
    FolderEntry, GetFilesHistoryRequest, ListFoldersRequest, ListFoldersResponse, LoginRequest,
    Page, ServerError,
};
pub use request::{Request, Response};
pub use validation::Validate;
