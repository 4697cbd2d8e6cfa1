//! Automatic sync on reconnect
//!
//! Watches the host's network state and runs a sync pass whenever the device
//! comes online. The pending count and each pass's report are published for
//! the UI.

use networking::NetworkState;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::queue::OfflineQueue;
use crate::sync::SyncReport;

const REPORT_CAPACITY: usize = 16;

/// Spawns the reconnect watcher
pub struct ConnectivityTrigger;

impl ConnectivityTrigger {
    /// Start watching `network` on the current tokio runtime
    ///
    /// Syncs once at startup if the network is already online, then on every
    /// published change whose latest value is online. The receiver is expected
    /// to publish only actual changes, as [`networking::ConnectivityMonitor`]
    /// does. The task stops when the sender side is dropped or the handle is
    /// shut down.
    pub fn spawn(queue: Arc<OfflineQueue>, mut network: watch::Receiver<NetworkState>) -> TriggerHandle {
        let (count_tx, count_rx) = watch::channel(queue.pending_count());
        let (report_tx, _) = broadcast::channel(REPORT_CAPACITY);
        let reports = report_tx.clone();

        let task = tokio::spawn(async move {
            loop {
                let state = *network.borrow_and_update();
                if state.is_online() {
                    tracing::info!("network online, syncing offline queue");
                    let report = queue.sync_queue(None).await;
                    count_tx.send_replace(queue.pending_count());
                    // No subscribers is fine
                    let _ = report_tx.send(report);
                }

                if network.changed().await.is_err() {
                    tracing::debug!("network state publisher gone, stopping sync trigger");
                    break;
                }
            }
        });

        TriggerHandle { task, pending: count_rx, reports }
    }
}

/// Handle to a running [`ConnectivityTrigger`]; dropping it stops the task
pub struct TriggerHandle {
    task: JoinHandle<()>,
    pending: watch::Receiver<usize>,
    reports: broadcast::Sender<SyncReport>,
}

impl TriggerHandle {
    /// Pending count, updated after every triggered pass
    pub fn pending_count(&self) -> watch::Receiver<usize> {
        self.pending.clone()
    }

    /// Reports of triggered passes from now on
    pub fn reports(&self) -> broadcast::Receiver<SyncReport> {
        self.reports.subscribe()
    }

    /// Whether the watcher task has stopped
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the watcher task
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for TriggerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
