//! Command codes understood by the server.
//!
//! The set is closed and versioned. A response reuses its request's code on
//! success and [`CommandCode::Error`] on failure; correlation is done by the
//! request id, never by the code.
//!
//! | Code | Name | Direction |
//! |------|------|-----------|
//! | 1 | `LOGIN` | client → server request |
//! | 2 | `ERROR` | server → client response wrapper |
//! | 3 | `FILES_HISTORY_REPORT` | server → client event |
//! | 4 | `DOWNLOAD_URL` | client → server request |
//! | 5 | `GET_FILES_HISTORY` | client → server request |
//! | 6 | `DELETE_FILE` | client → server request |
//! | 7 | `STOP_DOWNLOADING` | client → server request |
//! | 8 | `RESUME_DOWNLOADING` | client → server request |
//! | 9 | `LIST_FOLDERS` | client → server request |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// CommandCode
// ============================================================================

/// Operation identifier carried in bytes 4..6 of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandCode {
    /// Authenticate the connection.
    Login = 1,
    /// Error response wrapper.
    Error = 2,
    /// Pushed progress report (request id 0).
    FilesHistoryReport = 3,
    /// Start downloading a URL on the server.
    DownloadUrl = 4,
    /// Page through the download history.
    GetFilesHistory = 5,
    /// Delete a downloaded file.
    DeleteFile = 6,
    /// Pause a running download.
    StopDownloading = 7,
    /// Resume a paused download.
    ResumeDownloading = 8,
    /// List folders under a server path.
    ListFolders = 9,
}

impl CommandCode {
    /// Every known command, in code order.
    pub const ALL: [Self; 9] = [
        Self::Login,
        Self::Error,
        Self::FilesHistoryReport,
        Self::DownloadUrl,
        Self::GetFilesHistory,
        Self::DeleteFile,
        Self::StopDownloading,
        Self::ResumeDownloading,
        Self::ListFolders,
    ];

    /// Returns the wire value.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Maps a wire value back to a command.
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Login),
            2 => Some(Self::Error),
            3 => Some(Self::FilesHistoryReport),
            4 => Some(Self::DownloadUrl),
            5 => Some(Self::GetFilesHistory),
            6 => Some(Self::DeleteFile),
            7 => Some(Self::StopDownloading),
            8 => Some(Self::ResumeDownloading),
            9 => Some(Self::ListFolders),
            _ => None,
        }
    }

    /// Protocol name of the command.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Error => "ERROR",
            Self::FilesHistoryReport => "FILES_HISTORY_REPORT",
            Self::DownloadUrl => "DOWNLOAD_URL",
            Self::GetFilesHistory => "GET_FILES_HISTORY",
            Self::DeleteFile => "DELETE_FILE",
            Self::StopDownloading => "STOP_DOWNLOADING",
            Self::ResumeDownloading => "RESUME_DOWNLOADING",
            Self::ListFolders => "LIST_FOLDERS",
        }
    }

    /// Returns `true` for commands a client may send.
    #[inline]
    #[must_use]
    pub const fn is_client_request(self) -> bool {
        !matches!(self, Self::Error | Self::FilesHistoryReport)
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<CommandCode> for u16 {
    #[inline]
    fn from(command: CommandCode) -> Self {
        command.code()
    }
}

// ============================================================================
// Tests
// ============================================================================
