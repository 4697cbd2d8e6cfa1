//! Durable offline mutation queue for the Umilax mobile client
//!
//! Write operations made while the device is offline are stored as
//! [`PendingItem`]s and replayed against the REST backend once connectivity
//! returns, in the order they were queued.
//!
//! ```no_run
//! use offline_queue::{HttpBackend, NewMutation, OfflineQueue, QueueConfig};
//! use networking::{HttpClient, HttpClientConfig, NetworkState};
//! use std::sync::Arc;
//! use storage::{KvConfig, KvCredentialStore, KvStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let kv = KvStore::open(KvConfig::new("umilax-data"))?;
//! let client = HttpClient::new(HttpClientConfig::from_env())?;
//! let queue = OfflineQueue::new(
//!     kv.clone(),
//!     Arc::new(HttpBackend::new(client)),
//!     Arc::new(KvCredentialStore::new(kv)),
//!     QueueConfig::from_env(),
//! );
//!
//! let mutation = NewMutation::post("/transactions/record/")
//!     .with_body(serde_json::json!({ "amount": 2500, "kind": "sale" }));
//! queue.submit(mutation, NetworkState::Offline).await?;
//!
//! let report = queue.sync_queue(None).await;
//! println!("synced {} failed {}", report.synced, report.failed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod item;
pub mod queue;
pub mod retry;
pub mod store;
pub mod sync;
pub mod trigger;

pub use backend::{
    Backend, BackendResponse, HttpBackend, MutationRequest, RefreshedTokens, TransportError,
    DEFAULT_REFRESH_PATH,
};
pub use config::{QueueConfig, DEFAULT_DEAD_LETTER_KEY, DEFAULT_QUEUE_KEY};
pub use item::{ItemPatch, ItemStatus, MutationMethod, NewMutation, PendingItem};
pub use queue::{OfflineQueue, QueueError, Result, SubmitOutcome};
pub use retry::RetryPolicy;
pub use store::{QueueStore, StoreError};
pub use sync::{SyncReport, Synchronizer};
pub use trigger::{ConnectivityTrigger, TriggerHandle};
