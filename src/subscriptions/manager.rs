//! Subscription manager for broadcasting store events.

use crate::types::Record;
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::types::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};

/// Internal subscription state.
struct Subscription {
    filter: SubscriptionFilter,
    sender: Sender<StoreEvent>,
}

impl Subscription {
    /// Try to send an event. Returns false if buffer is full or the receiver is gone.
    fn try_send(&self, event: StoreEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }

    /// Check if this subscription wants an event.
    fn matches(&self, event: &StoreEvent) -> bool {
        match event.collection() {
            Some(collection) => {
                if !self.filter.include_records {
                    return false;
                }
                match self.filter.collections {
                    Some(ref names) => names.iter().any(|n| n == collection),
                    None => true,
                }
            }
            None => self.filter.include_lifecycle,
        }
    }
}

/// Manages subscriptions and broadcasts events.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        let subscription = Subscription {
            filter: config.filter,
            sender,
        };

        self.subscriptions.write().insert(id, subscription);

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Send dropped event (best effort)
            let _ = sub.sender.try_send(StoreEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    // --- Broadcasting ---

    pub fn broadcast_initialized(&self, collections: Vec<String>) {
        self.broadcast(StoreEvent::Initialized { collections });
    }

    pub fn broadcast_inserted(&self, collection: &str, position: usize, record: &Record) {
        self.broadcast(StoreEvent::Inserted {
            collection: collection.to_string(),
            position,
            record: record.clone(),
        });
    }

    pub fn broadcast_exported(&self, collection: &str, filename: &str, rows: usize) {
        self.broadcast(StoreEvent::Exported {
            collection: collection.to_string(),
            filename: filename.to_string(),
            rows,
        });
    }

    pub fn broadcast_cleared(&self) {
        self.broadcast(StoreEvent::Cleared);
    }

    /// Internal broadcast helper. Drops subscribers that fail to receive.
    fn broadcast(&self, event: StoreEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            if subs.is_empty() {
                return;
            }
            for (id, sub) in subs.iter() {
                if sub.matches(&event) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        // Remove dropped subscriptions
        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    debug!(subscription = id.0, "dropping slow subscriber");
                    // Try to notify about the drop (might fail, that's ok)
                    let _ = sub.sender.try_send(StoreEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn make_test_record() -> Record {
        match json!({"studentNumber": "123", "name": "Jane Doe"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let manager = SubscriptionManager::new();

        let handle = manager.subscribe(SubscriptionConfig::default());
        assert_eq!(manager.subscription_count(), 1);

        manager.unsubscribe(handle.id);
        assert_eq!(manager.subscription_count(), 0);

        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(
            event,
            StoreEvent::Dropped {
                reason: DropReason::Unsubscribed
            }
        );
    }

    #[test]
    fn test_broadcast_to_matching() {
        let manager = SubscriptionManager::new();

        let handle = manager.subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::collections(vec!["students".to_string()]),
            ..Default::default()
        });

        manager.broadcast_inserted("students", 0, &make_test_record());

        match handle.recv_timeout(Duration::from_millis(100)).unwrap() {
            StoreEvent::Inserted {
                collection,
                position,
                record,
            } => {
                assert_eq!(collection, "students");
                assert_eq!(position, 0);
                assert_eq!(record["name"], "Jane Doe");
            }
            other => panic!("Expected Inserted event, got {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_filters_non_matching() {
        let manager = SubscriptionManager::new();

        let handle = manager.subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::collections(vec!["students".to_string()]),
            ..Default::default()
        });

        manager.broadcast_inserted("assignments", 0, &make_test_record());
        manager.broadcast_cleared();

        let result = handle.recv_timeout(Duration::from_millis(50));
        assert!(result.is_err());
    }

    #[test]
    fn test_lifecycle_only() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::lifecycle(),
            ..Default::default()
        });

        manager.broadcast_exported("students", "students_1.csv", 1);
        manager.broadcast_cleared();

        assert_eq!(handle.drain(), vec![StoreEvent::Cleared]);
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let manager = SubscriptionManager::new();
        let _handle = manager.subscribe(SubscriptionConfig {
            buffer_size: 2,
            filter: SubscriptionFilter::all(),
        });

        for i in 0..10 {
            manager.broadcast_inserted("students", i, &make_test_record());
        }

        assert_eq!(manager.subscription_count(), 0);
    }

    #[test]
    fn test_disconnected_subscriber_is_removed() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig::default());
        drop(handle);

        manager.broadcast_cleared();
        assert_eq!(manager.subscription_count(), 0);
    }
}
