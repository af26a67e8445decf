//! Request body validation.
//!
//! The server validates every decoded request before handing it to the
//! [`RequestHandler`](crate::server::RequestHandler). Failures become
//! `VALIDATION` error responses.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Component, Path};

use url::Url;

use super::payload::{
    DownloadUrlRequest, FileIdRequest, GetFilesHistoryRequest, ListFoldersRequest, LoginRequest,
    ServerError,
};

// ============================================================================
// Constants
// ============================================================================

/// Characters allowed in a username besides ASCII letters and digits.
const USERNAME_EXTRA_CHARS: &[char] = &['_', '.', '@'];

const MAX_USERNAME_LEN: usize = 255;
const MAX_PASSWORD_LEN: usize = 1_000;
const MAX_FILE_NAME_LEN: usize = 255;
const MAX_PATH_LEN: usize = 1_000;
const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Validate
// ============================================================================

/// Checks a request body before it is executed.
pub trait Validate {
    /// Returns a `VALIDATION` error describing the first violated rule.
    fn validate(&self) -> Result<(), ServerError>;
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ServerError> {
        not_empty(&self.username, "Username")?;
        max_len(&self.username, MAX_USERNAME_LEN, "Username")?;
        if !self
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || USERNAME_EXTRA_CHARS.contains(&c))
        {
            return Err(ServerError::validation("Username contain unallowed char."));
        }

        not_empty(&self.password, "Password")?;
        max_len(&self.password, MAX_PASSWORD_LEN, "Password")
    }
}

impl Validate for DownloadUrlRequest {
    fn validate(&self) -> Result<(), ServerError> {
        not_blank(&self.url, "URL")?;
        let url = Url::parse(&self.url)
            .map_err(|_| ServerError::validation("Failed to parse URL."))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ServerError::validation("Unsupported URL schema."));
        }

        not_blank(&self.file_name, "File name")?;
        max_len(&self.file_name, MAX_FILE_NAME_LEN, "File name")?;
        if self.file_name.contains(['/', '\0']) || !is_single_component(&self.file_name) {
            return Err(ServerError::validation("File name contain unallowed char."));
        }

        if let Some(path) = &self.path {
            validate_path(path)?;
        }

        Ok(())
    }
}

impl Validate for GetFilesHistoryRequest {
    fn validate(&self) -> Result<(), ServerError> {
        if self.size < 1 {
            return Err(ServerError::validation("Size should be at least 1."));
        }
        if self.size > MAX_PAGE_SIZE {
            return Err(ServerError::validation(format!(
                "Size should be at most {MAX_PAGE_SIZE}."
            )));
        }
        Ok(())
    }
}

impl Validate for FileIdRequest {
    fn validate(&self) -> Result<(), ServerError> {
        not_empty(&self.file_id, "File ID")
    }
}

impl Validate for ListFoldersRequest {
    fn validate(&self) -> Result<(), ServerError> {
        match &self.path {
            Some(path) => {
                not_empty(path, "Path")?;
                validate_path(path)
            }
            None => Ok(()),
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

fn not_empty(value: &str, field: &str) -> Result<(), ServerError> {
    if value.is_empty() {
        return Err(ServerError::validation(format!("{field} should not be empty.")));
    }
    Ok(())
}

fn not_blank(value: &str, field: &str) -> Result<(), ServerError> {
    if value.trim().is_empty() {
        return Err(ServerError::validation(format!("{field} should not be blank.")));
    }
    Ok(())
}

fn max_len(value: &str, max: usize, field: &str) -> Result<(), ServerError> {
    if value.chars().count() > max {
        return Err(ServerError::validation(format!("{field} is too long.")));
    }
    Ok(())
}

fn validate_path(path: &str) -> Result<(), ServerError> {
    max_len(path, MAX_PATH_LEN, "Path")?;
    if path.contains('\0') {
        return Err(ServerError::validation("Path contain unallowed char."));
    }
    Ok(())
}

/// `true` if the name is exactly one normal path component.
fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

// ============================================================================
// Tests
// ============================================================================
