//! Queue synchronization
//!
//! Replays queued mutations against the backend, oldest first, one at a time.
//! Each item's outcome is independent: successes are removed immediately, and
//! failures are recorded on the item and left for the next pass. A 401 gets
//! one transparent token refresh and retry; if the refresh cannot happen the
//! stored credentials are cleared so the app falls back to login.
//!
//! Only one pass runs at a time. A `sync` issued while a pass is in flight
//! joins it and gets the same report.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use storage::CredentialStore;
use tokio::sync::broadcast;

use crate::backend::{Backend, MutationRequest, RefreshedTokens};
use crate::item::{ItemPatch, PendingItem};
use crate::retry::RetryPolicy;
use crate::store::QueueStore;

const NO_REFRESH_TOKEN: &str = "no refresh token available";

/// Aggregate outcome of a sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Items confirmed by the backend and removed
    pub synced: usize,
    /// Items whose replay failed (still queued or dead-lettered)
    pub failed: usize,
    /// Items skipped because their backoff window has not elapsed
    pub deferred: usize,
    /// Failed items moved to the dead-letter collection
    pub dead_lettered: usize,
}

enum Outcome {
    Synced,
    Failed(String),
}

enum Role {
    Lead(broadcast::Sender<SyncReport>),
    Join(broadcast::Receiver<SyncReport>),
}

type InFlightSlot = Mutex<Option<broadcast::Sender<SyncReport>>>;

/// Clears the in-flight slot when the leading pass ends, even by panic or
/// cancellation.
struct InFlightGuard<'a> {
    slot: &'a InFlightSlot,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

/// Replays the durable queue against the backend
pub struct Synchronizer {
    store: Arc<QueueStore>,
    backend: Arc<dyn Backend>,
    credentials: Arc<dyn CredentialStore>,
    retry: RetryPolicy,
    in_flight: InFlightSlot,
}

impl Synchronizer {
    /// Create a synchronizer
    pub fn new(
        store: Arc<QueueStore>,
        backend: Arc<dyn Backend>,
        credentials: Arc<dyn CredentialStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self { store, backend, credentials, retry, in_flight: Mutex::new(None) }
    }

    /// Whether a pass is currently running
    pub fn is_syncing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Replay every queued item
    ///
    /// `explicit_token` takes priority over the stored access token. Never
    /// fails: per-item failures are recorded on the items and summarized in
    /// the report.
    pub async fn sync(&self, explicit_token: Option<String>) -> SyncReport {
        let tx = match self.join_or_lead() {
            Role::Lead(tx) => tx,
            Role::Join(mut rx) => {
                tracing::debug!("sync already in progress, joining it");
                return match rx.recv().await {
                    Ok(report) => report,
                    Err(e) => {
                        tracing::warn!(error = %e, "in-flight sync ended without a report");
                        SyncReport::default()
                    }
                };
            }
        };

        let guard = InFlightGuard { slot: &self.in_flight };
        let report = self.run_pass(explicit_token).await;
        drop(guard);

        let _ = tx.send(report);
        report
    }

    fn join_or_lead(&self) -> Role {
        let mut slot = self.in_flight.lock();
        if let Some(tx) = slot.as_ref() {
            return Role::Join(tx.subscribe());
        }

        let (tx, _rx) = broadcast::channel(1);
        *slot = Some(tx.clone());
        Role::Lead(tx)
    }

    async fn run_pass(&self, explicit_token: Option<String>) -> SyncReport {
        let mut report = SyncReport::default();

        let items = self.store.list();
        if items.is_empty() {
            return report;
        }

        tracing::info!(pending = items.len(), "starting sync pass");

        let mut token = match explicit_token {
            Some(token) => Some(token),
            None => self.stored_access_token().await,
        };

        for item in items {
            // Removed by the user while earlier items were replaying
            let Some(item) = self.store.get(&item.id) else {
                continue;
            };

            if self.retry.should_defer(&item, Utc::now()) {
                tracing::debug!(item_id = %item.id, retries = item.retries, "deferring item");
                report.deferred += 1;
                continue;
            }

            match self.replay(&item, &mut token).await {
                Outcome::Synced => {
                    if let Err(e) = self.store.remove(&item.id) {
                        tracing::error!(item_id = %item.id, error = %e, "failed to drop synced item");
                    }
                    tracing::debug!(item_id = %item.id, endpoint = %item.endpoint, "item synced");
                    report.synced += 1;
                }
                Outcome::Failed(error) => {
                    report.failed += 1;
                    if self.record_failure(&item, error) {
                        report.dead_lettered += 1;
                    }
                }
            }
        }

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            deferred = report.deferred,
            dead_lettered = report.dead_lettered,
            "sync pass finished"
        );
        report
    }

    async fn replay(&self, item: &PendingItem, token: &mut Option<String>) -> Outcome {
        if let Err(e) = self.store.patch(&item.id, &ItemPatch::syncing()) {
            tracing::error!(item_id = %item.id, error = %e, "failed to mark item syncing");
        }

        let request = MutationRequest::for_item(item, token.clone());
        let response = match self.backend.send(&request).await {
            Ok(response) => response,
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        if response.is_success() {
            return Outcome::Synced;
        }
        if !response.is_unauthorized() {
            return Outcome::Failed(response.body);
        }

        tracing::debug!(item_id = %item.id, "unauthorized, refreshing access token");
        let access = match self.refresh_access_token(token.as_deref()).await {
            Ok(access) => access,
            Err(reason) => {
                tracing::warn!(item_id = %item.id, reason = %reason, "token refresh failed, clearing credentials");
                self.clear_credentials().await;
                *token = None;
                return Outcome::Failed(reason);
            }
        };
        *token = access.clone();

        let retry = MutationRequest::for_item(item, access);
        match self.backend.send(&retry).await {
            Ok(response) if response.is_success() => Outcome::Synced,
            Ok(response) => Outcome::Failed(response.body),
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    /// Trade the stored refresh token for a new access token and persist it
    ///
    /// A successful response without `access` keeps `current`. Only a missing
    /// refresh token, a failed exchange, or an unparsable body is an error.
    async fn refresh_access_token(&self, current: Option<&str>) -> Result<Option<String>, String> {
        let refresh = match self.credentials.refresh_token().await {
            Ok(Some(refresh)) => refresh,
            Ok(None) => return Err(NO_REFRESH_TOKEN.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "could not read refresh token");
                return Err(NO_REFRESH_TOKEN.to_string());
            }
        };

        let response = self.backend.refresh(&refresh).await.map_err(|e| e.to_string())?;
        if !response.is_success() {
            return Err(response.body);
        }

        let tokens: RefreshedTokens = serde_json::from_str(&response.body)
            .map_err(|e| format!("invalid refresh response: {}", e))?;

        let access = tokens.access.or_else(|| current.map(str::to_string));
        match access.as_deref() {
            Some(access) => {
                if let Err(e) = self.credentials.save_tokens(access, tokens.refresh.as_deref()).await {
                    tracing::warn!(error = %e, "could not persist refreshed tokens");
                }
            }
            None => tracing::warn!("refresh response carried no access token and none is held"),
        }

        Ok(access)
    }

    async fn stored_access_token(&self) -> Option<String> {
        match self.credentials.access_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "could not read access token, sending unauthenticated");
                None
            }
        }
    }

    async fn clear_credentials(&self) {
        if let Err(e) = self.credentials.clear_tokens().await {
            tracing::error!(error = %e, "failed to clear credentials");
        }
    }

    /// Record a failed attempt; returns whether the item was dead-lettered
    fn record_failure(&self, item: &PendingItem, error: String) -> bool {
        let retries = item.retries.saturating_add(1);
        tracing::debug!(item_id = %item.id, retries, error = %error, "item failed");

        let patch = ItemPatch::failed(retries, error, Utc::now());
        if let Err(e) = self.store.patch(&item.id, &patch) {
            tracing::error!(item_id = %item.id, error = %e, "failed to record item failure");
        }

        let mut failed = item.clone();
        patch.apply(&mut failed);
        if !self.retry.is_exhausted(&failed) {
            return false;
        }

        match self.store.move_to_dead_letter(&item.id) {
            Ok(moved) => {
                if moved {
                    tracing::warn!(item_id = %item.id, retries, "retries exhausted, item dead-lettered");
                }
                moved
            }
            Err(e) => {
                tracing::error!(item_id = %item.id, error = %e, "failed to dead-letter item");
                false
            }
        }
    }
}
