//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Poll Cycle    │  │     Push Transport      │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Configuration  │  │  HealthCheck    │  │  TransportDropped       │ │
//! │  │    Invalid      │  │    Failed       │  │                         │ │
//! │  │  ConfigLoad/    │  │  FetchFailed    │  │                         │ │
//! │  │    SaveFailed   │  │  InvalidResp.   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │   Submission    │  │    Internal     │                              │
//! │  │                 │  │                 │                              │
//! │  │  SubmitFailed   │  │  ChannelError   │                              │
//! │  │  Validation     │  │                 │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure inside an engine is classified here first, then surfaced via
//! the status snapshot and used to drive the retry/backoff transition.

use thiserror::Error;
use threadflow_core::ValidationError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Coarse classification used by status reporting and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    HealthCheckFailed,
    FetchFailed,
    TransportDropped,
    InvalidResponse,
    ConfigurationInvalid,
    Other,
}

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration (bad URL, impossible backoff, ...).
    #[error("Invalid sync configuration: {0}")]
    ConfigurationInvalid(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Poll Cycle Errors
    // =========================================================================
    /// `/health` answered non-2xx or could not be reached.
    #[error("Server health check failed: {message}")]
    HealthCheckFailed {
        status: Option<u16>,
        message: String,
    },

    /// `/completed_tasks` answered non-2xx or could not be reached.
    #[error("Failed to fetch completed tasks: {0}")]
    FetchFailed(String),

    /// Body was not JSON or did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // =========================================================================
    // Push Transport Errors
    // =========================================================================
    /// Live connection closed, errored, or could not be opened.
    #[error("Connection dropped: {0}")]
    TransportDropped(String),

    // =========================================================================
    // Submission Errors
    // =========================================================================
    /// Server refused a task submission.
    #[error("Task submission failed: {0}")]
    SubmitFailed(String),

    /// Submission input rejected locally.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else if err.is_timeout() {
            SyncError::FetchFailed(format!("request timed out: {}", err))
        } else {
            SyncError::FetchFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::InvalidResponse(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::ConfigurationInvalid(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                SyncError::TransportDropped("connection closed".into())
            }
            WsError::Url(url) => SyncError::ConfigurationInvalid(url.to_string()),
            WsError::Io(io) => SyncError::TransportDropped(io.to_string()),
            other => SyncError::TransportDropped(other.to_string()),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::HealthCheckFailed { .. } => ErrorKind::HealthCheckFailed,
            SyncError::FetchFailed(_) => ErrorKind::FetchFailed,
            SyncError::TransportDropped(_) => ErrorKind::TransportDropped,
            SyncError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            SyncError::ConfigurationInvalid(_)
            | SyncError::ConfigLoadFailed(_)
            | SyncError::ConfigSaveFailed(_) => ErrorKind::ConfigurationInvalid,
            SyncError::SubmitFailed(_) | SyncError::Validation(_) | SyncError::ChannelError(_) => {
                ErrorKind::Other
            }
        }
    }

    /// Returns true if the engines retry automatically after this error.
    ///
    /// ## Retryable Errors
    /// - Health probe / fetch failures (network or non-2xx)
    /// - Malformed bodies (the next cycle may succeed)
    /// - Dropped or failed WebSocket connections
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Submission rejections
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::HealthCheckFailed
                | ErrorKind::FetchFailed
                | ErrorKind::TransportDropped
                | ErrorKind::InvalidResponse
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        self.kind() == ErrorKind::ConfigurationInvalid
    }
}
