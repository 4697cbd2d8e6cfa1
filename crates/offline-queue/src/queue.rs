//! Offline queue service
//!
//! [`OfflineQueue`] is the one object the app talks to. It owns the durable
//! store and the synchronizer and is shared by `Arc` between screens and the
//! connectivity trigger.

use std::sync::Arc;
use storage::{CredentialStore, KvStore};
use thiserror::Error;

use crate::backend::{Backend, MutationRequest};
use crate::config::QueueConfig;
use crate::item::{ItemPatch, NewMutation, PendingItem};
use crate::store::{QueueStore, StoreError};
use crate::sync::{SyncReport, Synchronizer};
use networking::NetworkState;

/// Queue error types
#[derive(Debug, Error)]
pub enum QueueError {
    /// Durable storage failure
    #[error("Queue storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// What happened to a submitted mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend accepted it right away
    Sent {
        /// Response status
        status: u16,
    },
    /// It was queued for a later sync pass
    Queued {
        /// Queue item id
        id: String,
    },
}

impl SubmitOutcome {
    /// Whether the mutation ended up in the queue
    pub fn is_queued(&self) -> bool {
        matches!(self, SubmitOutcome::Queued { .. })
    }
}

/// Durable offline mutation queue
pub struct OfflineQueue {
    store: Arc<QueueStore>,
    backend: Arc<dyn Backend>,
    credentials: Arc<dyn CredentialStore>,
    synchronizer: Synchronizer,
}

impl OfflineQueue {
    /// Create the queue on top of `kv`
    pub fn new(
        kv: KvStore,
        backend: Arc<dyn Backend>,
        credentials: Arc<dyn CredentialStore>,
        config: QueueConfig,
    ) -> Self {
        let store = Arc::new(QueueStore::new(kv, &config));
        let synchronizer =
            Synchronizer::new(store.clone(), backend.clone(), credentials.clone(), config.retry);

        Self { store, backend, credentials, synchronizer }
    }

    /// Append a mutation to the end of the queue and return its id
    pub fn add_to_queue(&self, item: impl Into<PendingItem>) -> Result<String> {
        Ok(self.store.enqueue(item.into())?)
    }

    /// Snapshot of the queue, oldest first
    pub fn get_queue(&self) -> Vec<PendingItem> {
        self.store.list()
    }

    /// Drop an item; returns whether it was queued
    pub fn clear_item(&self, id: &str) -> Result<bool> {
        Ok(self.store.remove(id)?)
    }

    /// Apply a partial update to an item; returns whether it was queued
    pub fn mark_item(&self, id: &str, patch: ItemPatch) -> Result<bool> {
        Ok(self.store.patch(id, &patch)?)
    }

    /// Replay the queue now
    ///
    /// Joins the running pass if one is already in flight.
    pub async fn sync_queue(&self, token: Option<String>) -> SyncReport {
        self.synchronizer.sync(token).await
    }

    /// Whether a sync pass is running
    pub fn is_syncing(&self) -> bool {
        self.synchronizer.is_syncing()
    }

    /// Send a mutation now if online, otherwise queue it
    ///
    /// A direct send that fails (non-2xx or transport error) is queued with
    /// the failure recorded on the item. Only storage failures are errors.
    pub async fn submit(&self, mutation: NewMutation, network: NetworkState) -> Result<SubmitOutcome> {
        if !network.is_online() {
            tracing::debug!(endpoint = %mutation.endpoint(), network = %network, "offline, queueing mutation");
            let id = self.add_to_queue(mutation)?;
            return Ok(SubmitOutcome::Queued { id });
        }

        let token = match self.credentials.access_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "could not read access token, sending unauthenticated");
                None
            }
        };

        let item = mutation.into_item();
        let request = MutationRequest::for_item(&item, token);
        let failure = match self.backend.send(&request).await {
            Ok(response) if response.is_success() => {
                return Ok(SubmitOutcome::Sent { status: response.status });
            }
            Ok(response) => response.body,
            Err(e) => e.to_string(),
        };

        tracing::info!(endpoint = %item.endpoint, error = %failure, "direct send failed, queueing mutation");
        let id = self.add_to_queue(PendingItem { error: Some(failure), ..item })?;
        Ok(SubmitOutcome::Queued { id })
    }

    /// Number of queued items
    pub fn pending_count(&self) -> usize {
        self.store.len()
    }

    /// Items that exhausted their retries
    pub fn dead_letters(&self) -> Vec<PendingItem> {
        self.store.dead_letters()
    }

    /// Put a dead letter back at the end of the queue with a fresh retry count
    pub fn retry_dead_letter(&self, id: &str) -> Result<bool> {
        Ok(self.store.requeue_dead_letter(id)?)
    }

    /// Drop every dead letter; returns how many were dropped
    pub fn discard_dead_letters(&self) -> Result<usize> {
        Ok(self.store.clear_dead_letters()?)
    }
}
