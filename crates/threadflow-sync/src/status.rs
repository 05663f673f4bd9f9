//! # Sync Status
//!
//! The engine-independent view of sync health that the UI renders.
//!
//! ```text
//!              start()                 ceiling exceeded (poll only)
//!   ┌──────┐ ─────────► ┌────────┐ ─────────────────────► ┌───────┐
//!   │ Idle │            │ Active │                        │ Error │
//!   └──────┘ ◄───────── └────────┘                        └───────┘
//!      ▲       stop()                                         │
//!      └──────────────────────── stop() ──────────────────────┘
//!                     reset() from any mode → Active
//! ```

use serde::{Deserialize, Serialize};

use crate::config::TransportKind;

/// Coarse lifecycle mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Idle,
    Active,
    Error,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Idle => write!(f, "idle"),
            SyncMode::Active => write!(f, "active"),
            SyncMode::Error => write!(f, "error"),
        }
    }
}

/// Normalized status snapshot, identical in shape for both engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub transport: TransportKind,
    pub mode: SyncMode,
    pub error_message: Option<String>,
    pub retry_or_reconnect_count: u32,
}

impl SyncStatus {
    /// Idle status for a transport that has not started.
    pub fn idle(transport: TransportKind) -> Self {
        SyncStatus {
            transport,
            mode: SyncMode::Idle,
            error_message: None,
            retry_or_reconnect_count: 0,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.transport, self.mode)?;
        if self.retry_or_reconnect_count > 0 {
            write!(f, " (retry {})", self.retry_or_reconnect_count)?;
        }
        if let Some(message) = &self.error_message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_json_shape() {
        let status = SyncStatus {
            transport: TransportKind::Poll,
            mode: SyncMode::Error,
            error_message: Some("Maximum retry count reached".into()),
            retry_or_reconnect_count: 6,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["mode"], "error");
        assert_eq!(json["retryOrReconnectCount"], 6);
        assert_eq!(json["errorMessage"], "Maximum retry count reached");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SyncStatus::idle(TransportKind::Push).to_string(), "push idle");

        let status = SyncStatus {
            transport: TransportKind::Poll,
            mode: SyncMode::Active,
            error_message: Some("HTTP 500".into()),
            retry_or_reconnect_count: 2,
        };
        assert_eq!(status.to_string(), "poll active (retry 2): HTTP 500");
    }
}
