//! # Domain Types
//!
//! Core domain types shared by every sync engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Item       │   │  CompletedItem  │   │   ItemStatus    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (ItemId)    │   │  id (ItemId)    │   │  Pending        │       │
//! │  │  status         │   │  data?          │   │  Completed      │       │
//! │  │  priority 1-10  │   │  priority?      │   └─────────────────┘       │
//! │  │  payload        │   │  completion_    │                              │
//! │  │  completion_    │   │    time?        │   ┌─────────────────┐       │
//! │  │    time?        │   └─────────────────┘   │    Priority     │       │
//! │  └─────────────────┘                         │  1 (low)..10    │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Item identifiers are opaque strings assigned by the task server at
//! submission time. The client never generates or parses them; it only
//! compares them for equality.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationResult};
use crate::validation;

// =============================================================================
// Item Identifier
// =============================================================================

/// Opaque, server-assigned item identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an identifier, rejecting blank strings.
    pub fn parse(raw: impl Into<String>) -> ValidationResult<Self> {
        let raw = raw.into();
        validation::validate_item_id(&raw)?;
        Ok(ItemId(raw))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Priority
// =============================================================================

/// Task priority in the inclusive range 1..=10.
///
/// Informational only: the sync engines never reorder by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(try_from = "i64", into = "u8")]
#[ts(export)]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority accepted by the task server.
    pub const MIN: Priority = Priority(crate::MIN_PRIORITY);

    /// Highest priority accepted by the task server.
    pub const MAX: Priority = Priority(crate::MAX_PRIORITY);

    /// Creates a priority, validating the 1..=10 range.
    pub fn new(value: i64) -> ValidationResult<Self> {
        validation::validate_priority(value)
    }

    /// Returns the raw priority value.
    #[inline]
    pub const fn value(&self) -> u8 {
        self.0
    }

    pub(crate) const fn from_validated(value: u8) -> Self {
        Priority(value)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::MIN
    }
}

impl TryFrom<i64> for Priority {
    type Error = crate::error::ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Priority::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Item Status
// =============================================================================

/// Lifecycle status of an item.
///
/// ```text
///   Pending ──(server reports completion)──► Completed
///                                              │
///                          never reverts ◄─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ItemStatus {
    /// Submitted, not yet reported as finished.
    #[default]
    Pending,
    /// Reported as finished by the server.
    Completed,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Completed => write!(f, "completed"),
        }
    }
}

// =============================================================================
// Completed Item (wire record)
// =============================================================================

/// A completion record as reported by the server and delivered to callers.
///
/// ## Wire Compatibility
/// ```json
/// { "id": "task_1712_42", "data": "resize image", "priority": 3,
///   "completion_time": "2024-04-10T12:00:00Z" }
/// ```
/// - `task_id` is accepted in place of `id`
/// - `completion_time` may be an RFC 3339 string or Unix seconds
/// - `data` and `priority` may be absent (push events carry only the id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CompletedItem {
    /// Server-assigned identifier.
    #[serde(alias = "task_id")]
    pub id: ItemId,

    /// User-supplied description, when the server echoes it.
    #[serde(default)]
    pub data: Option<String>,

    /// Priority the item was submitted with, when known.
    #[serde(default)]
    pub priority: Option<u8>,

    /// When the server finished the item.
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    #[ts(as = "Option<String>")]
    pub completion_time: Option<DateTime<Utc>>,
}

impl CompletedItem {
    /// Creates a bare completion record carrying only an identifier.
    pub fn new(id: impl Into<ItemId>) -> Self {
        CompletedItem {
            id: id.into(),
            data: None,
            priority: None,
            completion_time: None,
        }
    }

    /// Attaches the item description.
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Attaches the submission priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Attaches the completion timestamp.
    pub fn with_completion_time(mut self, at: DateTime<Utc>) -> Self {
        self.completion_time = Some(at);
        self
    }
}

/// Lenient timestamp decoding: RFC 3339 text or integer Unix seconds.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Seconds(i64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<RawTimestamp>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawTimestamp::Seconds(secs)) => DateTime::from_timestamp(secs, 0)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}"))),
            Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(D::Error::custom),
        }
    }
}

// =============================================================================
// Item
// =============================================================================

/// One unit of asynchronous work as tracked by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Item {
    /// Server-assigned identifier.
    pub id: ItemId,

    /// Lifecycle status.
    pub status: ItemStatus,

    /// Submission priority (1-10).
    pub priority: Priority,

    /// User-supplied description.
    pub payload: String,

    /// Set exactly once, when the item becomes completed.
    #[ts(as = "Option<String>")]
    pub completion_time: Option<DateTime<Utc>>,
}

impl Item {
    /// Creates a freshly submitted item.
    pub fn pending(id: ItemId, payload: impl Into<String>, priority: Priority) -> Self {
        Item {
            id,
            status: ItemStatus::Pending,
            priority,
            payload: payload.into(),
            completion_time: None,
        }
    }

    /// Returns true once the item has been reported finished.
    pub fn is_completed(&self) -> bool {
        self.status == ItemStatus::Completed
    }

    /// Transitions the item to completed.
    ///
    /// Returns false and leaves the item untouched if it was already
    /// completed; the first completion time wins.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_completed() {
            return false;
        }
        self.status = ItemStatus::Completed;
        self.completion_time = Some(at);
        true
    }

    /// Applies a server completion record to this item.
    ///
    /// Uses the record's timestamp when present, otherwise `fallback`.
    pub fn apply(&mut self, record: &CompletedItem, fallback: DateTime<Utc>) -> CoreResult<bool> {
        if record.id != self.id {
            return Err(CoreError::IdMismatch {
                expected: self.id.to_string(),
                actual: record.id.to_string(),
            });
        }
        Ok(self.mark_completed(record.completion_time.unwrap_or(fallback)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_item_id_parse_rejects_blank() {
        assert!(ItemId::parse("task_1_2").is_ok());
        assert!(ItemId::parse("").is_err());
        assert!(ItemId::parse("   ").is_err());
    }

    #[test]
    fn test_priority_range() {
        assert_eq!(Priority::new(1).unwrap(), Priority::MIN);
        assert_eq!(Priority::new(10).unwrap(), Priority::MAX);
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(11).is_err());
        assert!(serde_json::from_str::<Priority>("42").is_err());
        assert_eq!(serde_json::from_str::<Priority>("7").unwrap().value(), 7);
    }

    #[test]
    fn test_completed_item_accepts_task_id_alias() {
        let item: CompletedItem =
            serde_json::from_str(r#"{"task_id":"task_9","completion_time":1700000000}"#).unwrap();
        assert_eq!(item.id.as_str(), "task_9");
        assert_eq!(
            item.completion_time,
            Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        );
        assert!(item.data.is_none());
    }

    #[test]
    fn test_completed_item_rfc3339_time() {
        let item: CompletedItem = serde_json::from_str(
            r#"{"id":"a","data":"resize","priority":3,"completion_time":"2024-04-10T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(item.data.as_deref(), Some("resize"));
        assert_eq!(item.priority, Some(3));
        assert_eq!(
            item.completion_time,
            Some(Utc.with_ymd_and_hms(2024, 4, 10, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_completed_item_rejects_garbage_time() {
        let parsed = serde_json::from_str::<CompletedItem>(r#"{"id":"a","completion_time":"soon"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_mark_completed_is_monotonic() {
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        let mut item = Item::pending("a".into(), "work", Priority::default());
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.mark_completed(first));
        assert!(!item.mark_completed(second));
        assert_eq!(item.completion_time, Some(first));
        assert!(item.is_completed());
    }

    #[test]
    fn test_apply_checks_identity() {
        let now = Utc::now();
        let mut item = Item::pending("a".into(), "work", Priority::default());
        assert!(item.apply(&CompletedItem::new("b"), now).is_err());
        assert!(item.apply(&CompletedItem::new("a"), now).unwrap());
        assert_eq!(item.completion_time, Some(now));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ItemStatus::Pending.to_string(), "pending");
        assert_eq!(ItemStatus::Completed.to_string(), "completed");
    }
}
