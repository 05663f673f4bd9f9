//! # Push Protocol Messages
//!
//! Frames exchanged with the task server over the WebSocket.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Push Protocol Messages                             │
//! │                                                                         │
//! │  KEEPALIVE                                                             │
//! │  ─────────                                                             │
//! │  CLIENT ───► { "type": "ping" }                                        │
//! │  SERVER ───► { "type": "pong", "timestamp": 1717171717 }               │
//! │                                                                         │
//! │  COMPLETION                                                            │
//! │  ──────────                                                            │
//! │  SERVER ───► { "type": "task_complete", "task_id": "task_42",          │
//! │                "status": "completed", "timestamp": 1717171717 }        │
//! │                                                                         │
//! │  ANYTHING ELSE                                                         │
//! │  ─────────────                                                         │
//! │  Unknown "type" values are ignored, never treated as a failure.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Internally tagged JSON text frames: the `type` field selects the variant
//! and the remaining fields sit beside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use threadflow_core::{CompletedItem, ItemId};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Outbound (client → server)
// =============================================================================

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keepalive probe.
    Ping,
}

impl ClientMessage {
    /// Serializes to JSON string.
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// =============================================================================
// Inbound (server → client)
// =============================================================================

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Keepalive acknowledgement.
    Pong {
        #[serde(default)]
        timestamp: Option<i64>,
    },

    /// A task finished.
    #[serde(alias = "task_completed")]
    TaskComplete {
        #[serde(alias = "id")]
        task_id: ItemId,

        #[serde(default)]
        status: Option<String>,

        /// Unix seconds.
        #[serde(default)]
        timestamp: Option<i64>,
    },

    /// Any other `type`.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Deserializes from JSON string.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        serde_json::from_str(json).map_err(|e| SyncError::InvalidResponse(e.to_string()))
    }

    /// Returns the message type name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::TaskComplete { .. } => "task_complete",
            ServerMessage::Unknown => "unknown",
        }
    }

    /// Converts a completion event into the record delivered to subscribers.
    pub fn into_completion(self) -> Option<CompletedItem> {
        match self {
            ServerMessage::TaskComplete {
                task_id, timestamp, ..
            } => {
                let mut item = CompletedItem::new(task_id);
                if let Some(at) = timestamp.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                {
                    item = item.with_completion_time(at);
                }
                Some(item)
            }
            _ => None,
        }
    }
}

// =============================================================================
// Close Codes
// =============================================================================

/// Close code used when the stream ends without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Maps a WebSocket close code to a human-readable diagnostic.
pub fn describe_close(code: u16) -> &'static str {
    match code {
        1000 => "Normal closure",
        1001 => "Server going away",
        1005 => "Closed without status code",
        1006 => "Abnormal closure (connection lost)",
        1011 => "Server error",
        1012 => "Server restarting",
        _ => "Connection closed",
    }
}

/// Formats a close event as `"<description> (code N): reason"`.
pub fn close_reason(code: u16, reason: &str) -> String {
    if reason.is_empty() {
        format!("{} (code {})", describe_close(code), code)
    } else {
        format!("{} (code {}): {}", describe_close(code), code, reason)
    }
}
