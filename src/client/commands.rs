//! Typed request helpers.
//!
//! Thin wrappers over [`Session::request`] building the body for each
//! command and decoding its result.
//!
//! | Method | Command | Result |
//! |--------|---------|--------|
//! | [`Session::download_url`] | `DOWNLOAD_URL` | [`FileRecord`] |
//! | [`Session::get_files_history`] | `GET_FILES_HISTORY` | [`Page<FileRecord>`] |
//! | [`Session::delete_file`] | `DELETE_FILE` | `()` |
//! | [`Session::stop_downloading`] | `STOP_DOWNLOADING` | [`FileRecord`] |
//! | [`Session::resume_downloading`] | `RESUME_DOWNLOADING` | [`FileRecord`] |
//! | [`Session::list_folders`] | `LIST_FOLDERS` | [`ListFoldersResponse`] |

use crate::error::Result;
use crate::protocol::{
    CommandCode, DownloadUrlRequest, FileIdRequest, FileRecord, GetFilesHistoryRequest,
    ListFoldersRequest, ListFoldersResponse, Page,
};

use super::Session;

impl Session {
    /// Starts downloading `url` into `file_name`, optionally under `path`.
    ///
    /// # Errors
    ///
    /// See [`Session::send`]. The server reports `VALIDATION` for a bad URL
    /// or file name, and `FAILED_TO_DOWNLOAD` if the download cannot start.
    pub async fn download_url(
        &self,
        url: impl Into<String>,
        file_name: impl Into<String>,
        path: Option<String>,
    ) -> Result<FileRecord> {
        let body = DownloadUrlRequest {
            url: url.into(),
            file_name: file_name.into(),
            path,
        };
        self.request(CommandCode::DownloadUrl, &body).await
    }

    /// Fetches one page of the download history.
    ///
    /// # Errors
    ///
    /// See [`Session::send`]. `size` outside `1..=100` is rejected with
    /// `VALIDATION`.
    pub async fn get_files_history(&self, offset: u32, size: u32) -> Result<Page<FileRecord>> {
        let body = GetFilesHistoryRequest { offset, size };
        self.request(CommandCode::GetFilesHistory, &body).await
    }

    /// Deletes a file and its history entry.
    ///
    /// # Errors
    ///
    /// See [`Session::send`]. Unknown ids give `NOT_FOUND`.
    pub async fn delete_file(&self, file_id: impl Into<String>) -> Result<()> {
        self.request(CommandCode::DeleteFile, &file_id_body(file_id))
            .await
    }

    /// Pauses a running download.
    ///
    /// # Errors
    ///
    /// See [`Session::send`].
    pub async fn stop_downloading(&self, file_id: impl Into<String>) -> Result<FileRecord> {
        self.request(CommandCode::StopDownloading, &file_id_body(file_id))
            .await
    }

    /// Resumes a paused download.
    ///
    /// # Errors
    ///
    /// See [`Session::send`].
    pub async fn resume_downloading(&self, file_id: impl Into<String>) -> Result<FileRecord> {
        self.request(CommandCode::ResumeDownloading, &file_id_body(file_id))
            .await
    }

    /// Lists a folder under the download root, or the root itself.
    ///
    /// # Errors
    ///
    /// See [`Session::send`].
    pub async fn list_folders(&self, path: Option<String>) -> Result<ListFoldersResponse> {
        let body = ListFoldersRequest { path };
        self.request(CommandCode::ListFolders, &body).await
    }
}

fn file_id_body(file_id: impl Into<String>) -> FileIdRequest {
    FileIdRequest {
        file_id: file_id.into(),
    }
}
