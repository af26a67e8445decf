//! Client configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use remote_downloader_rpc::client::{ClientConfig, ReconnectPolicy};
//!
//! # fn example() -> remote_downloader_rpc::Result<()> {
//! let config = ClientConfig::builder()
//!     .address("downloads.local:8080")
//!     .credentials("admin", "secret")
//!     .subscribe_to_reports(true)
//!     .reconnect(ReconnectPolicy::Fixed(Duration::from_secs(5)))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::LoginRequest;

use super::policy::{ReconnectPolicy, RetryPolicy};

// ============================================================================
// Constants
// ============================================================================

/// Path the server accepts WebSocket upgrades on.
pub const DEFAULT_PATH: &str = "/websocket";

/// Default time allowed for the transport to open.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for the LOGIN response.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on outstanding calls.
pub const DEFAULT_MAX_PENDING: usize = 100;

// ============================================================================
// Credentials
// ============================================================================

/// Login credentials. The password is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[inline]
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// ClientConfig
// ============================================================================

/// Validated client configuration.
///
/// Use [`ClientConfig::builder()`] to create one.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) url: Url,
    pub(crate) credentials: Credentials,
    pub(crate) subscribe_to_reports: bool,
    pub(crate) retry: RetryPolicy,
    pub(crate) reconnect: ReconnectPolicy,
    pub(crate) connect_timeout: Duration,
    pub(crate) auth_timeout: Duration,
    pub(crate) max_pending: usize,
    pub(crate) fail_fast_login: bool,
    /// First request id issued on each link.
    pub(crate) first_request_id: u32,
}

impl ClientConfig {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the server URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the login credentials.
    #[inline]
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the request retry policy.
    #[inline]
    #[must_use]
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Returns the reconnect policy.
    #[inline]
    #[must_use]
    pub fn reconnect(&self) -> ReconnectPolicy {
        self.reconnect
    }

    /// Builds the LOGIN body for these credentials.
    pub(crate) fn login_request(&self) -> LoginRequest {
        LoginRequest {
            username: self.credentials.username.clone(),
            password: self.credentials.password.clone(),
            subscribe_on_downloading_files_report: self.subscribe_to_reports,
        }
    }
}

// ============================================================================
// ClientConfigBuilder
// ============================================================================

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    address: Option<String>,
    credentials: Option<Credentials>,
    subscribe_to_reports: bool,
    retry: RetryPolicy,
    reconnect: ReconnectPolicy,
    connect_timeout: Duration,
    auth_timeout: Duration,
    max_pending: usize,
    fail_fast_login: bool,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            address: None,
            credentials: None,
            subscribe_to_reports: false,
            retry: RetryPolicy::default(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            max_pending: DEFAULT_MAX_PENDING,
            fail_fast_login: false,
        }
    }
}

impl ClientConfigBuilder {
    /// Creates a builder with default policies and no address.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server address.
    ///
    /// Either a full `ws://` / `wss://` URL, or `host:port`, which expands
    /// to `ws://host:port/websocket`.
    #[inline]
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the login credentials.
    #[inline]
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Asks the server to push `FILES_HISTORY_REPORT` events after login.
    #[inline]
    #[must_use]
    pub fn subscribe_to_reports(mut self, subscribe: bool) -> Self {
        self.subscribe_to_reports = subscribe;
        self
    }

    /// Sets the request retry policy.
    #[inline]
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Sets the reconnect policy.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the time allowed for the transport to open.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the time allowed for the LOGIN response.
    #[inline]
    #[must_use]
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Sets the cap on outstanding calls.
    #[inline]
    #[must_use]
    pub fn max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }

    /// Closes the session instead of reconnecting when the very first login
    /// attempt is rejected.
    #[inline]
    #[must_use]
    pub fn fail_fast_login(mut self, fail_fast: bool) -> Self {
        self.fail_fast_login = fail_fast;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the address or credentials are missing or
    /// invalid, or a policy or limit is zero.
    pub fn build(self) -> Result<ClientConfig> {
        let url = self.validate_address()?;
        let credentials = self.validate_credentials()?;
        self.validate_limits()?;

        Ok(ClientConfig {
            url,
            credentials,
            subscribe_to_reports: self.subscribe_to_reports,
            retry: self.retry,
            reconnect: self.reconnect,
            connect_timeout: self.connect_timeout,
            auth_timeout: self.auth_timeout,
            max_pending: self.max_pending,
            fail_fast_login: self.fail_fast_login,
            first_request_id: 1,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientConfigBuilder {
    fn validate_address(&self) -> Result<Url> {
        let address = self.address.as_deref().map(str::trim).ok_or_else(|| {
            Error::config(
                "Server address is required. Use .address() to set it.\n\
                 Example: ClientConfig::builder().address(\"localhost:8080\")",
            )
        })?;

        if address.is_empty() {
            return Err(Error::config("Server address is empty."));
        }

        let raw = if address.contains("://") {
            address.to_string()
        } else {
            format!("ws://{address}{DEFAULT_PATH}")
        };

        let url = Url::parse(&raw)
            .map_err(|e| Error::config(format!("Invalid server address '{address}': {e}")))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::config(format!(
                    "Unsupported scheme '{other}' in '{address}'. Use ws:// or wss://."
                )));
            }
        }

        if url.host_str().is_none() {
            return Err(Error::config(format!("Server address '{address}' has no host.")));
        }

        Ok(url)
    }

    fn validate_credentials(&self) -> Result<Credentials> {
        let credentials = self.credentials.clone().ok_or_else(|| {
            Error::config(
                "Credentials are required. Use .credentials() to set them.\n\
                 Example: ClientConfig::builder().credentials(\"admin\", \"secret\")",
            )
        })?;

        if credentials.username.is_empty() {
            return Err(Error::config("Username is empty."));
        }
        if credentials.password.is_empty() {
            return Err(Error::config("Password is empty."));
        }

        Ok(credentials)
    }

    fn validate_limits(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "Retry policy needs at least one attempt. Use RetryPolicy::disabled() for no resends.",
            ));
        }
        if self.retry.interval.is_zero() {
            return Err(Error::config("Retry interval must be greater than zero."));
        }
        if self.max_pending == 0 {
            return Err(Error::config("max_pending must be at least 1."));
        }
        if self.connect_timeout.is_zero() || self.auth_timeout.is_zero() {
            return Err(Error::config("Timeouts must be greater than zero."));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
