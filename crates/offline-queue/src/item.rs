//! Queued mutation records
//!
//! A [`PendingItem`] is one client-issued write (create/update/delete) that has
//! not been confirmed by the backend yet. The persisted JSON layout matches what
//! earlier app versions wrote, so `retries`, `status` and `error` may be missing
//! from stored records and fall back to their defaults.

use chrono::{DateTime, Utc};
use networking::HttpMethod;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Write method of a queued mutation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationMethod {
    /// Create
    Post,
    /// Replace
    Put,
    /// Partial update
    Patch,
    /// Delete
    Delete,
}

impl From<MutationMethod> for HttpMethod {
    fn from(method: MutationMethod) -> Self {
        match method {
            MutationMethod::Post => HttpMethod::Post,
            MutationMethod::Put => HttpMethod::Put,
            MutationMethod::Patch => HttpMethod::Patch,
            MutationMethod::Delete => HttpMethod::Delete,
        }
    }
}

impl fmt::Display for MutationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(HttpMethod::from(*self).as_str())
    }
}

/// Replay status of a queued mutation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Waiting for the first replay
    #[default]
    Pending,
    /// Replay in progress
    Syncing,
    /// Last replay failed; will be retried on the next pass
    Failed,
    /// Confirmed by the backend (transient, the item is removed right after)
    Synced,
}

/// A queued mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingItem {
    /// Client-generated identifier, stable across retries
    pub id: String,
    /// Resource path relative to the backend base URL
    pub endpoint: String,
    /// Write method
    pub method: MutationMethod,
    /// Request payload, opaque to the queue
    #[serde(default)]
    pub body: Value,
    /// Number of failed replay attempts
    #[serde(default)]
    pub retries: u32,
    /// Replay status
    #[serde(default)]
    pub status: ItemStatus,
    /// Last failure message
    #[serde(default)]
    pub error: Option<String>,
    /// When the last failed attempt happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl PendingItem {
    /// Whether the last replay of this item failed
    pub fn is_failed(&self) -> bool {
        self.status == ItemStatus::Failed
    }
}

/// Builder for a new client-issued mutation
///
/// # Examples
/// ```
/// use offline_queue::{MutationMethod, NewMutation};
///
/// let mutation = NewMutation::post("/transactions/record/")
///     .json(&serde_json::json!({ "amount": 1000, "type": "service" }))
///     .unwrap();
/// let item = mutation.into_item();
///
/// assert_eq!(item.method, MutationMethod::Post);
/// assert_eq!(item.retries, 0);
/// ```
#[derive(Debug, Clone)]
pub struct NewMutation {
    id: String,
    endpoint: String,
    method: MutationMethod,
    body: Value,
    error: Option<String>,
}

impl NewMutation {
    /// Start a mutation with a fresh id and an empty body
    pub fn new(method: MutationMethod, endpoint: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            endpoint: endpoint.into(),
            method,
            body: Value::Null,
            error: None,
        }
    }

    /// POST mutation
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(MutationMethod::Post, endpoint)
    }

    /// PUT mutation
    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(MutationMethod::Put, endpoint)
    }

    /// PATCH mutation
    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(MutationMethod::Patch, endpoint)
    }

    /// DELETE mutation
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(MutationMethod::Delete, endpoint)
    }

    /// Use a caller-chosen id instead of a generated one
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the payload from any serializable value
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = serde_json::to_value(body)?;
        Ok(self)
    }

    /// Set an already-built JSON payload
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Record the failure that caused the mutation to be queued
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Identifier the item will be stored under
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Target resource path
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Payload
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Convert into a fresh pending item
    pub fn into_item(self) -> PendingItem {
        PendingItem {
            id: self.id,
            endpoint: self.endpoint,
            method: self.method,
            body: self.body,
            retries: 0,
            status: ItemStatus::Pending,
            error: self.error,
            last_attempt_at: None,
        }
    }
}

impl From<NewMutation> for PendingItem {
    fn from(mutation: NewMutation) -> Self {
        mutation.into_item()
    }
}

/// Partial update of a queued item
///
/// `None` leaves a field untouched. For `error` and `last_attempt_at` the
/// inner `Option` distinguishes clearing (`Some(None)`) from setting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    /// New resource path
    pub endpoint: Option<String>,
    /// New write method
    pub method: Option<MutationMethod>,
    /// New payload
    pub body: Option<Value>,
    /// New retry count
    pub retries: Option<u32>,
    /// New status
    pub status: Option<ItemStatus>,
    /// New error message, or `Some(None)` to clear it
    pub error: Option<Option<String>>,
    /// New last-attempt timestamp, or `Some(None)` to clear it
    pub last_attempt_at: Option<Option<DateTime<Utc>>>,
}

impl ItemPatch {
    /// Empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch that marks an item as being replayed and clears its last error
    pub fn syncing() -> Self {
        Self::new().status(ItemStatus::Syncing).clear_error()
    }

    /// Patch recording a failed replay attempt
    pub fn failed(retries: u32, error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new()
            .status(ItemStatus::Failed)
            .retries(retries)
            .error(error)
            .attempted_at(at)
    }

    /// Set the status
    pub fn status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the retry count
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Set the error message
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    /// Clear the error message
    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    /// Set the last-attempt timestamp
    pub fn attempted_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_attempt_at = Some(Some(at));
        self
    }

    /// Replace the payload
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Replace the resource path
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Replace the write method
    pub fn method(mut self, method: MutationMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Merge the patch into an item
    pub fn apply(&self, item: &mut PendingItem) {
        if let Some(endpoint) = &self.endpoint {
            item.endpoint = endpoint.clone();
        }
        if let Some(method) = self.method {
            item.method = method;
        }
        if let Some(body) = &self.body {
            item.body = body.clone();
        }
        if let Some(retries) = self.retries {
            item.retries = retries;
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(error) = &self.error {
            item.error = error.clone();
        }
        if let Some(at) = self.last_attempt_at {
            item.last_attempt_at = at;
        }
    }
}
