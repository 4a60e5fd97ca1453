//! Subscription types for live store updates.

use crate::types::Record;
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 256
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionFilter {
    /// Only these collections (None = every collection).
    pub collections: Option<Vec<String>>,

    /// Include per-collection events (inserts, exports).
    pub include_records: bool,

    /// Include store-wide events (initialized, cleared).
    pub include_lifecycle: bool,
}

impl SubscriptionFilter {
    /// Record events for specific collections.
    pub fn collections(names: Vec<String>) -> Self {
        Self {
            collections: Some(names),
            include_records: true,
            ..Default::default()
        }
    }

    /// Store-wide events only.
    pub fn lifecycle() -> Self {
        Self {
            include_lifecycle: true,
            ..Default::default()
        }
    }

    /// Subscribe to everything.
    pub fn all() -> Self {
        Self {
            collections: None,
            include_records: true,
            include_lifecycle: true,
        }
    }
}

/// Events emitted by subscriptions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// Setup finished; these collections are present.
    Initialized { collections: Vec<String> },

    /// A record was appended at `position` (zero-based).
    Inserted {
        collection: String,
        position: usize,
        record: Record,
    },

    /// A collection was exported.
    Exported {
        collection: String,
        filename: String,
        rows: usize,
    },

    /// The whole store was wiped.
    Cleared,

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

impl StoreEvent {
    /// Collection this event concerns, if any.
    pub fn collection(&self) -> Option<&str> {
        match self {
            StoreEvent::Inserted { collection, .. } | StoreEvent::Exported { collection, .. } => {
                Some(collection.as_str())
            }
            _ => None,
        }
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StoreEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StoreEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<StoreEvent> {
        self.receiver.try_iter().collect()
    }
}
