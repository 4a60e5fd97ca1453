//! Subscription system for live store updates.
//!
//! In-process subscribers are told when the store changes:
//! - Setup finished
//! - Records appended to a collection
//! - Collections exported
//! - The store was cleared
//!
//! Subscriptions filter by collection and use bounded buffers; a subscriber
//! that falls behind is dropped.
//!
//! # Example
//!
//! ```ignore
//! let handle = db.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::collections(vec!["assignments".to_string()]),
//!     ..Default::default()
//! });
//!
//! while let Ok(event) = handle.recv() {
//!     match event {
//!         StoreEvent::Inserted { record, .. } => refresh_list(record),
//!         StoreEvent::Dropped { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};
