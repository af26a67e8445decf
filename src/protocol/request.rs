//! Request and Response message types.
//!
//! [`Request`] is the typed form of a client request as the server sees it,
//! after the frame body has been parsed and validated. [`Response`] is a
//! correlated reply as the client sees it.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::payload::{
    DownloadUrlRequest, ErrorKind, FileIdRequest, GetFilesHistoryRequest, ListFoldersRequest,
    ServerError,
};
use super::validation::Validate;
use super::{CommandCode, Frame};

// ============================================================================
// Request
// ============================================================================

/// An authenticated client request, decoded and validated.
///
/// LOGIN is not part of this enum: it is consumed by the connection's
/// authentication gate before requests reach a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `DOWNLOAD_URL`.
    DownloadUrl(DownloadUrlRequest),
    /// `GET_FILES_HISTORY`.
    GetFilesHistory(GetFilesHistoryRequest),
    /// `DELETE_FILE`.
    DeleteFile(FileIdRequest),
    /// `STOP_DOWNLOADING`.
    StopDownloading(FileIdRequest),
    /// `RESUME_DOWNLOADING`.
    ResumeDownloading(FileIdRequest),
    /// `LIST_FOLDERS`.
    ListFolders(ListFoldersRequest),
}

impl Request {
    /// Decodes and validates a request body.
    ///
    /// # Errors
    ///
    /// - `UNKNOWN_COMMAND` if the code is not a handler command
    /// - `VALIDATION` if the body does not parse or fails validation
    pub fn parse(command: u16, body: Value) -> StdResult<Self, ServerError> {
        let request = match CommandCode::from_code(command) {
            Some(CommandCode::DownloadUrl) => Self::DownloadUrl(parse_body(body)?),
            Some(CommandCode::GetFilesHistory) => Self::GetFilesHistory(parse_body(body)?),
            Some(CommandCode::DeleteFile) => Self::DeleteFile(parse_body(body)?),
            Some(CommandCode::StopDownloading) => Self::StopDownloading(parse_body(body)?),
            Some(CommandCode::ResumeDownloading) => Self::ResumeDownloading(parse_body(body)?),
            Some(CommandCode::ListFolders) => Self::ListFolders(parse_body(body)?),
            _ => {
                return Err(ServerError::new(ErrorKind::UnknownCommand, "Unknown command."));
            }
        };

        request.validate()?;
        Ok(request)
    }

    /// Returns the command code of this request.
    #[must_use]
    pub const fn command(&self) -> CommandCode {
        match self {
            Self::DownloadUrl(_) => CommandCode::DownloadUrl,
            Self::GetFilesHistory(_) => CommandCode::GetFilesHistory,
            Self::DeleteFile(_) => CommandCode::DeleteFile,
            Self::StopDownloading(_) => CommandCode::StopDownloading,
            Self::ResumeDownloading(_) => CommandCode::ResumeDownloading,
            Self::ListFolders(_) => CommandCode::ListFolders,
        }
    }
}

impl Validate for Request {
    fn validate(&self) -> StdResult<(), ServerError> {
        match self {
            Self::DownloadUrl(req) => req.validate(),
            Self::GetFilesHistory(req) => req.validate(),
            Self::DeleteFile(req) | Self::StopDownloading(req) | Self::ResumeDownloading(req) => {
                req.validate()
            }
            Self::ListFolders(req) => req.validate(),
        }
    }
}

/// Parses a JSON body into a request DTO, mapping failures to `VALIDATION`.
pub(crate) fn parse_body<T: DeserializeOwned>(body: Value) -> StdResult<T, ServerError> {
    serde_json::from_value(body)
        .map_err(|e| ServerError::validation(format!("Invalid request body: {e}")))
}

// ============================================================================
// Response
// ============================================================================

/// A correlated response from the server.
///
/// # Format
///
/// Success: request id and command echoed, body is the command's result
/// (or empty for `null`).
///
/// Error: request id echoed, command `2`, body `{"type": "...", "message": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Matches the request's id.
    pub id: RequestId,
    /// Raw command code of the response frame.
    pub command: u16,
    /// Parsed JSON body.
    pub body: Value,
}

impl Response {
    /// Builds a response from a decoded frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the body is not UTF-8 JSON.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Ok(Self {
            id: frame.request_id,
            command: frame.command,
            body: frame.body()?,
        })
    }

    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.command == CommandCode::Error.code()
    }

    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.is_error()
    }

    /// Extracts the server error body, if this is an error response.
    ///
    /// A body that is not a well-formed error object is reported as
    /// `UNKNOWN` carrying the raw JSON.
    #[must_use]
    pub fn server_error(&self) -> Option<ServerError> {
        if !self.is_error() {
            return None;
        }

        Some(
            serde_json::from_value(self.body.clone())
                .unwrap_or_else(|_| ServerError::unknown(self.body.to_string())),
        )
    }

    /// Extracts the result value, returning error if the response was an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] carrying the server's error kind and message.
    pub fn into_result(self) -> Result<Value> {
        match self.server_error() {
            Some(error) => Err(Error::from(error)),
            None => Ok(self.body),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
