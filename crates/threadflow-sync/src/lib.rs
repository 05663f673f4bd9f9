//! # threadflow-sync: Completion Sync Engines
//!
//! This crate learns when submitted tasks finish, exactly once each, over
//! either periodic HTTP polling or a live WebSocket.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Completion Sync                                 │
//! │                                                                         │
//! │                        ┌──────────────┐                                 │
//! │   start/stop/reset ──► │  SyncFacade  │ ──► status() / watch()          │
//! │                        └──────┬───────┘ ──► completions()               │
//! │                 ┌─────────────┴─────────────┐                           │
//! │                 ▼                           ▼                           │
//! │       ┌──────────────────┐        ┌──────────────────┐                  │
//! │       │  PollSyncEngine  │        │  PushSyncEngine  │                  │
//! │       │  /health         │        │  ws connect      │                  │
//! │       │  /completed_tasks│        │  ping keepalive  │                  │
//! │       │  retry ceiling   │        │  endless retry   │                  │
//! │       └────────┬─────────┘        └────────┬─────────┘                  │
//! │                └─────────────┬─────────────┘                            │
//! │                              ▼                                          │
//! │                     ┌─────────────────┐                                 │
//! │                     │ CompletionSink  │  dedup + ordered channel        │
//! │                     └─────────────────┘                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`facade`] - `SyncFacade`, the transport-agnostic handle
//! - [`poll`] - HTTP polling engine with cursor and failure ceiling
//! - [`push`] - WebSocket engine with keepalive and reconnect
//! - [`http`] - `CompletionSource` trait and the reqwest implementation
//! - [`delivery`] - Deduplicating completion sink
//! - [`protocol`] - WebSocket frame types and close-code diagnostics
//! - [`status`] - Normalized status snapshot
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Sync error types
//! - [`mock`] - Scripted source for tests and demos
//!
//! ## Usage
//!
//! ```rust,ignore
//! use threadflow_sync::{SyncConfig, SyncFacade};
//!
//! let config = SyncConfig::load_or_default(None);
//! let facade = SyncFacade::from_config(&config)?;
//! let mut completions = facade.completions().expect("first subscriber");
//!
//! facade.start();
//! while let Some(item) = completions.next().await {
//!     println!("{} finished", item.id);
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod delivery;
pub mod error;
pub mod facade;
pub mod http;
pub mod mock;
pub mod poll;
pub mod protocol;
pub mod push;
pub mod status;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{SyncConfig, TransportKind};
pub use delivery::{CompletionReceiver, CompletionSink, SharedDeduper};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use facade::{Completions, StatusWatch, SyncFacade};
pub use http::{CompletionSource, HealthStatus, HttpCompletionSource};
pub use mock::MockCompletionSource;
pub use poll::{PollConfig, PollStatus, PollSyncEngine};
pub use protocol::{describe_close, ClientMessage, ServerMessage};
pub use push::{ConnectionState, PushConfig, PushStatus, PushSyncEngine};
pub use status::{SyncMode, SyncStatus};
