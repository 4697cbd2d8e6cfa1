//! Durable queue store
//!
//! The whole pending collection lives under a single key in the key-value
//! store as a JSON array, in insertion order. Every mutation is a full
//! read-modify-write of that array, so mutations are serialized through an
//! in-process lock.
//!
//! Reads fail soft: a missing or malformed collection is treated as empty, and
//! the next write replaces it.

use parking_lot::Mutex;
use storage::{KvError, KvStore};
use thiserror::Error;

use crate::config::QueueConfig;
use crate::item::{ItemPatch, ItemStatus, PendingItem};

/// Queue store error types
#[derive(Debug, Error)]
pub enum StoreError {
    /// The collection could not be written
    #[error("Storage error: {0}")]
    Storage(#[from] KvError),

    /// An item with this id is already queued
    #[error("Item already queued: {0}")]
    DuplicateId(String),
}

/// Result type for queue store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable, ordered collection of pending mutations
pub struct QueueStore {
    kv: KvStore,
    queue_key: String,
    dead_letter_key: String,
    write_lock: Mutex<()>,
}

impl QueueStore {
    /// Create a store on top of a key-value store
    pub fn new(kv: KvStore, config: &QueueConfig) -> Self {
        Self {
            kv,
            queue_key: config.queue_key.clone(),
            dead_letter_key: config.dead_letter_key.clone(),
            write_lock: Mutex::new(()),
        }
    }

    /// Append a mutation to the end of the queue
    ///
    /// The item is stored as given; items built with
    /// [`NewMutation`](crate::NewMutation) start out pending with zero retries.
    /// Returns the item's id.
    pub fn enqueue(&self, item: PendingItem) -> Result<String> {
        let _guard = self.write_lock.lock();
        let mut items = self.read(&self.queue_key);

        if items.iter().any(|existing| existing.id == item.id) {
            return Err(StoreError::DuplicateId(item.id));
        }

        let id = item.id.clone();
        tracing::debug!(item_id = %id, endpoint = %item.endpoint, method = %item.method, "queued mutation");
        items.push(item);
        self.write(&self.queue_key, &items)?;

        Ok(id)
    }

    /// Snapshot of the queue, oldest first
    pub fn list(&self) -> Vec<PendingItem> {
        self.read(&self.queue_key)
    }

    /// Look up a single item
    pub fn get(&self, id: &str) -> Option<PendingItem> {
        self.list().into_iter().find(|item| item.id == id)
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.list().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete an item
    ///
    /// Removing an id that is not queued is a no-op. Returns whether an item
    /// was removed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut items = self.read(&self.queue_key);

        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Ok(false);
        }

        self.write(&self.queue_key, &items)?;
        Ok(true)
    }

    /// Merge a patch into an item
    ///
    /// Patching an id that is not queued is a no-op. Returns whether an item
    /// was patched.
    pub fn patch(&self, id: &str, patch: &ItemPatch) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut items = self.read(&self.queue_key);

        let Some(item) = items.iter_mut().find(|item| item.id == id) else {
            return Ok(false);
        };
        patch.apply(item);

        self.write(&self.queue_key, &items)?;
        Ok(true)
    }

    /// Snapshot of the dead-letter collection, oldest first
    pub fn dead_letters(&self) -> Vec<PendingItem> {
        self.read(&self.dead_letter_key)
    }

    /// Move an item from the queue to the dead-letter collection
    ///
    /// Returns whether the item was queued.
    pub fn move_to_dead_letter(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut items = self.read(&self.queue_key);

        let Some(index) = items.iter().position(|item| item.id == id) else {
            return Ok(false);
        };
        let item = items.remove(index);

        // Dead-letter written first so a crash in between duplicates instead of dropping
        let mut dead = self.read(&self.dead_letter_key);
        dead.retain(|existing| existing.id != item.id);
        dead.push(item);
        self.write(&self.dead_letter_key, &dead)?;
        self.write(&self.queue_key, &items)?;

        Ok(true)
    }

    /// Put a dead-lettered item back at the end of the queue with a clean slate
    ///
    /// Returns whether the item was found.
    pub fn requeue_dead_letter(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut dead = self.read(&self.dead_letter_key);

        let Some(index) = dead.iter().position(|item| item.id == id) else {
            return Ok(false);
        };
        let mut item = dead.remove(index);
        item.retries = 0;
        item.status = ItemStatus::Pending;
        item.error = None;
        item.last_attempt_at = None;

        let mut items = self.read(&self.queue_key);
        items.retain(|existing| existing.id != item.id);
        items.push(item);
        self.write(&self.queue_key, &items)?;
        self.write(&self.dead_letter_key, &dead)?;

        Ok(true)
    }

    /// Drop every dead-lettered item
    ///
    /// Returns how many were dropped.
    pub fn clear_dead_letters(&self) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let count = self.read(&self.dead_letter_key).len();
        self.kv.remove(&self.dead_letter_key)?;
        Ok(count)
    }

    fn read(&self, key: &str) -> Vec<PendingItem> {
        match self.kv.get::<Vec<PendingItem>>(key) {
            Ok(Some(items)) => items,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(key, error = %e, "unreadable queue collection, treating as empty");
                Vec::new()
            }
        }
    }

    fn write(&self, key: &str, items: &[PendingItem]) -> Result<()> {
        self.kv.set(key, &items)?;
        Ok(())
    }
}
