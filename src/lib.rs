//! # Sign-off Store
//!
//! A small local record store for tracking assignment sign-offs, plus CSV
//! export of what has been recorded.
//!
//! ## Core Concepts
//!
//! - **Collections**: Named, append-only sequences of JSON object records
//! - **Schema**: The collections a store creates on setup, with optional seed rows
//! - **Backends**: Any async string key-value store (in-memory or on disk)
//! - **Export**: CSV rendering handed to a platform-specific delivery
//!
//! ## Example
//!
//! ```ignore
//! use signoff_store::{Database, FileStoreConfig, Schema, Student};
//!
//! let schema = Schema::new().collection("students")?.collection("assignments")?;
//! let db = Database::open_file(FileStoreConfig::default(), schema).await?;
//!
//! db.insert("students", &Student::new("123", "Jane Doe")).await?;
//! let students: Vec<Student> = db.select_as("students").await?;
//!
//! let report = db.export_to_csv("students").await?;
//! println!("{}", report.export.content);
//! ```

pub mod database;
pub mod error;
pub mod export;
pub mod kv;
pub mod schema;
pub mod signoff;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use database::{Database, ExportReport, SetupState};
pub use error::{BackendError, BackendResult, Result, StoreError};
pub use export::{
    render_csv, CsvDelivery, CsvExport, Delivered, DeliveryConfig, DownloadDelivery,
    DownloadTarget, Platform, ShareDelivery, ShareTarget, CSV_MIME,
};
pub use kv::{FileStore, FileStoreConfig, KeyValueStore, MemoryStore};
pub use schema::{CollectionSpec, Schema};
pub use signoff::{ScanPayload, SignOff, SignOffBook, SignOffDraft, ASSIGNMENTS, STUDENTS};
pub use subscriptions::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, SubscriptionManager,
};
pub use types::*;
