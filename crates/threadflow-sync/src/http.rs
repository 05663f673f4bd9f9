//! # HTTP Completion Source
//!
//! Request/response access to the task server, used by the poll engine and
//! by the monitor for submissions.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Task Server HTTP API                               │
//! │                                                                         │
//! │  GET  /health                    → { "status": "ok", "version", ... }  │
//! │  GET  /completed_tasks[?since=X] → { "tasks": [ CompletedItem... ] }   │
//! │  GET  /tasks                     → { "tasks": <queue depth> }          │
//! │  POST /submit { data, priority } → { "status", "task_id" }             │
//! │                                    | { "error": "..." }                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The poll engine only sees the [`CompletionSource`] trait, so tests can
//! swap in [`MockCompletionSource`](crate::mock::MockCompletionSource).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use threadflow_core::validation::{validate_payload, validate_priority};
use threadflow_core::{CompletedItem, ItemId};
use tracing::{debug, info};
use url::Url;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Source Trait
// =============================================================================

/// Where the poll engine gets completions from.
#[async_trait]
pub trait CompletionSource: Send + Sync + 'static {
    /// Probes server liveness.
    async fn check_health(&self) -> SyncResult<HealthStatus>;

    /// Lists completions newer than `since` (all of them when `None`),
    /// oldest first.
    async fn fetch_completed(&self, since: Option<&ItemId>) -> SyncResult<Vec<CompletedItem>>;
}

// =============================================================================
// Wire Types
// =============================================================================

/// Decoded `/health` body. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default = "default_health_status")]
    pub status: String,

    #[serde(default)]
    pub version: Option<String>,

    /// Seconds since server start.
    #[serde(default)]
    pub uptime: Option<u64>,

    #[serde(default)]
    pub environment: Option<String>,
}

fn default_health_status() -> String {
    "ok".to_string()
}

impl HealthStatus {
    /// A minimal healthy response.
    pub fn ok() -> Self {
        HealthStatus {
            status: default_health_status(),
            version: None,
            uptime: None,
            environment: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletedTasksResponse {
    #[serde(default, alias = "completed_tasks")]
    tasks: Option<Vec<CompletedItem>>,
}

#[derive(Debug, Deserialize)]
struct QueueDepthResponse {
    tasks: u64,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    data: &'a str,
    priority: u8,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    task_id: Option<ItemId>,

    #[serde(default)]
    error: Option<String>,
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// reqwest-backed [`CompletionSource`].
#[derive(Debug, Clone)]
pub struct HttpCompletionSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpCompletionSource {
    /// Creates a source rooted at `base_url`.
    ///
    /// Every request is bounded by `request_timeout`.
    pub fn new(base_url: &str, request_timeout: Duration) -> SyncResult<Self> {
        let base = Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SyncError::ConfigurationInvalid(e.to_string()))?;
        Ok(HttpCompletionSource { client, base })
    }

    /// Creates a source from the `[server]` section.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(&config.server.api_url, config.request_timeout())
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        let joined = format!("{}/{}", self.base.as_str().trim_end_matches('/'), path);
        Ok(Url::parse(&joined)?)
    }

    /// Returns the number of tasks waiting in the server queue.
    pub async fn queue_depth(&self) -> SyncResult<u64> {
        let response = self.client.get(self.endpoint("tasks")?).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::FetchFailed(format!("queue depth: HTTP {}", status)));
        }
        let body = response.text().await?;
        let parsed: QueueDepthResponse = serde_json::from_str(&body)?;
        Ok(parsed.tasks)
    }

    /// Submits a new task and returns its server-assigned identifier.
    ///
    /// The payload and priority are validated locally before any request is
    /// made.
    pub async fn submit(&self, payload: &str, priority: i64) -> SyncResult<ItemId> {
        let payload = validate_payload(payload)?;
        let priority = validate_priority(priority)?;

        let request = SubmitRequest {
            data: &payload,
            priority: priority.value(),
        };
        let response = self
            .client
            .post(self.endpoint("submit")?)
            .json(&request)
            .send()
            .await
            .map_err(|e| SyncError::SubmitFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::SubmitFailed(format!("reading response: {}", e)))?;
        let parsed: Option<SubmitResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(SubmitResponse {
                task_id: Some(id), ..
            }) if status.is_success() => {
                info!(task_id = %id, priority = priority.value(), "Task submitted");
                Ok(id)
            }
            Some(SubmitResponse {
                error: Some(message),
                ..
            }) => Err(SyncError::SubmitFailed(message)),
            _ if status.is_success() => Err(SyncError::InvalidResponse(
                "submit response did not include a task_id".into(),
            )),
            _ => Err(SyncError::SubmitFailed(format!("HTTP {}", status))),
        }
    }
}

#[async_trait]
impl CompletionSource for HttpCompletionSource {
    async fn check_health(&self) -> SyncResult<HealthStatus> {
        let response = self
            .client
            .get(self.endpoint("health")?)
            .send()
            .await
            .map_err(|e| SyncError::HealthCheckFailed {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HealthCheckFailed {
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SyncError::HealthCheckFailed {
                status: Some(status.as_u16()),
                message: e.to_string(),
            })?;
        let health: HealthStatus = serde_json::from_str(&body)?;
        debug!(status = %health.status, version = ?health.version, uptime = ?health.uptime, "Server healthy");
        Ok(health)
    }

    async fn fetch_completed(&self, since: Option<&ItemId>) -> SyncResult<Vec<CompletedItem>> {
        let mut request = self.client.get(self.endpoint("completed_tasks")?);
        if let Some(cursor) = since {
            request = request.query(&[("since", cursor.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::FetchFailed(format!("HTTP {}", status)));
        }

        let body = response.text().await?;
        let parsed: CompletedTasksResponse = serde_json::from_str(&body)?;
        let tasks = parsed.tasks.unwrap_or_default();
        debug!(count = tasks.len(), since = ?since.map(ItemId::as_str), "Fetched completed tasks");
        Ok(tasks)
    }
}
