//! Retry policy for failed replays
//!
//! With the default policy every failed item is retried on every sync pass,
//! indefinitely. A cap moves items to the dead-letter collection once they have
//! failed often enough; a backoff schedule defers items that failed recently.

use chrono::{DateTime, Utc};
use networking::BackoffConfig;

use crate::item::PendingItem;

/// Retry policy applied by the synchronizer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryPolicy {
    /// Failures after which an item is dead-lettered (`None` retries forever)
    pub max_retries: Option<u32>,
    /// Minimum wait between attempts (`None` retries on every pass)
    pub backoff: Option<BackoffConfig>,
}

impl RetryPolicy {
    /// Retry forever, on every pass
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Cap the number of failures
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }

    /// Defer items according to a backoff schedule
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Whether an item has exhausted its retries
    pub fn is_exhausted(&self, item: &PendingItem) -> bool {
        self.max_retries.is_some_and(|max| item.retries >= max)
    }

    /// Earliest time the item may be replayed again, if it is being held back
    pub fn next_attempt_at(&self, item: &PendingItem) -> Option<DateTime<Utc>> {
        let backoff = self.backoff.as_ref()?;
        let last = item.last_attempt_at?;
        if item.retries == 0 {
            return None;
        }

        let delay = backoff.delay_for(item.retries - 1);
        let delay = chrono::Duration::from_std(delay).ok()?;
        last.checked_add_signed(delay)
    }

    /// Whether the item should be skipped on a pass running at `now`
    pub fn should_defer(&self, item: &PendingItem, now: DateTime<Utc>) -> bool {
        self.next_attempt_at(item).is_some_and(|next| now < next)
    }
}
