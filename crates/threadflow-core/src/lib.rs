//! # threadflow-core: Pure Completion-Sync Logic
//!
//! This crate holds every piece of the completion-sync engine that can be
//! expressed without I/O: the item model, the backoff schedule, duplicate
//! suppression, and cursor tracking.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ThreadFlow Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/monitor (CLI / UI layer)                   │   │
//! │  │        watch ──► SyncFacade ──► completions + status           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                threadflow-sync (engines)                        │   │
//! │  │   PollSyncEngine (HTTP)      PushSyncEngine (WebSocket)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            ★ threadflow-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  backoff  │  │   dedup   │  │  cursor   │  │   │
//! │  │   │   Item    │  │  Backoff  │  │Completion │  │  Cursor   │  │   │
//! │  │   │ Completed │  │  Policy   │  │  Deduper  │  │  Tracker  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO TIMERS • NO NETWORK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Item, CompletedItem, ItemId, Priority, ItemStatus
//! - [`backoff`] - Capped exponential delay schedule
//! - [`dedup`] - At-most-once delivery bookkeeping
//! - [`cursor`] - Incremental fetch cursor
//! - [`error`] - Domain error types
//! - [`validation`] - Input checks for submission
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::Duration;
//! use threadflow_core::{BackoffPolicy, CompletedItem, CompletionDeduper};
//!
//! let policy = BackoffPolicy::default();
//! assert_eq!(policy.compute_delay(1), Duration::from_millis(7_500));
//!
//! let mut dedup = CompletionDeduper::new();
//! assert!(dedup.accept(&CompletedItem::new("task_1")));
//! assert!(!dedup.accept(&CompletedItem::new("task_1")));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backoff;
pub mod cursor;
pub mod dedup;
pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use backoff::BackoffPolicy;
pub use cursor::CursorTracker;
pub use dedup::CompletionDeduper;
pub use error::{CoreError, CoreResult, ValidationError, ValidationResult};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Lowest task priority the server accepts.
pub const MIN_PRIORITY: u8 = 1;

/// Highest task priority the server accepts.
pub const MAX_PRIORITY: u8 = 10;
