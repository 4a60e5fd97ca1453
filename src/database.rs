//! The record store: schema-declared collections over a key-value backend.

use crate::error::{Result, StoreError};
use crate::export::{CsvDelivery, CsvExport, Delivered};
use crate::kv::{FileStore, FileStoreConfig, KeyValueStore};
use crate::schema::Schema;
use crate::subscriptions::{
    SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::types::{json_kind, to_record, CollectionName, Record, Timestamp};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tracing::{debug, error, info};

/// Initialization state of a [`Database`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupState {
    /// `setup` has not completed since construction or the last `clear`.
    Uninitialized,
    /// Every schema collection is present.
    Ready,
    /// The last `setup` failed; collections may be missing.
    Failed,
}

/// Result of an export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportReport {
    pub export: CsvExport,
    /// `None` when no delivery is attached.
    pub delivered: Option<Delivered>,
}

/// The record store.
///
/// Each collection lives under its own key as a JSON array. Appends hold a
/// per-collection lock across their read-modify-write, so concurrent inserts
/// through one `Database` never lose records. Separate instances over the
/// same backend are not coordinated.
pub struct Database<S> {
    /// Underlying key-value store.
    store: S,

    /// Declared collections; never mutated.
    schema: Schema,

    /// Collections whose template has been merged by this instance.
    merged: Mutex<HashSet<CollectionName>>,

    state: RwLock<SetupState>,

    /// One lock per collection, created on first use.
    locks: Mutex<HashMap<CollectionName, Arc<AsyncMutex<()>>>>,

    /// Shared by ordinary operations, taken exclusively by `clear`.
    reset_gate: AsyncRwLock<()>,

    delivery: Option<Arc<dyn CsvDelivery>>,

    subscriptions: SubscriptionManager,
}

impl<S: KeyValueStore> Database<S> {
    /// Create a store without touching the backend.
    ///
    /// Call [`Database::setup`] before relying on schema collections being
    /// present, or use [`Database::open`].
    pub fn new(store: S, schema: Schema) -> Self {
        Self {
            store,
            schema,
            merged: Mutex::new(HashSet::new()),
            state: RwLock::new(SetupState::Uninitialized),
            locks: Mutex::new(HashMap::new()),
            reset_gate: AsyncRwLock::new(()),
            delivery: None,
            subscriptions: SubscriptionManager::new(),
        }
    }

    /// Create a store and run setup.
    pub async fn open(store: S, schema: Schema) -> Result<Self> {
        let db = Self::new(store, schema);
        db.setup().await?;
        Ok(db)
    }

    /// Attach the delivery used by [`Database::export_to_csv`].
    pub fn with_delivery(mut self, delivery: Arc<dyn CsvDelivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn state(&self) -> SetupState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SetupState::Ready
    }

    // --- Setup ---

    /// Make sure every schema collection exists, keeping persisted data.
    ///
    /// A missing collection is written with its template. An existing one is
    /// parsed and, the first time this instance merges it, the template is
    /// placed in front of the stored rows. Running setup again is a no-op.
    pub async fn setup(&self) -> Result<()> {
        let _gate = self.reset_gate.read().await;

        match self.converge().await {
            Ok(()) => {
                *self.state.write() = SetupState::Ready;
                info!(collections = self.schema.len(), "record store ready");
                self.subscriptions
                    .broadcast_initialized(self.schema.names().map(|n| n.to_string()).collect());
                Ok(())
            }
            Err(e) => {
                *self.state.write() = SetupState::Failed;
                error!(error = %e, "record store setup failed");
                Err(e)
            }
        }
    }

    async fn converge(&self) -> Result<()> {
        for spec in self.schema.collections() {
            let lock = self.collection_lock(&spec.name);
            let _guard = lock.lock().await;

            let first_merge = !self.merged.lock().contains(&spec.name);
            let template: &[Record] = if first_merge { &spec.template } else { &[] };

            match self.store.get(spec.name.as_str()).await? {
                None => {
                    self.write_collection(&spec.name, template).await?;
                    debug!(collection = %spec.name, rows = template.len(), "created collection");
                }
                Some(raw) => {
                    let existing = parse_collection(&spec.name, &raw)?;
                    if !template.is_empty() {
                        let mut combined = template.to_vec();
                        combined.extend(existing);
                        self.write_collection(&spec.name, &combined).await?;
                    }
                    debug!(
                        collection = %spec.name,
                        seeded = template.len(),
                        "merged existing collection"
                    );
                }
            }

            self.merged.lock().insert(spec.name.clone());
        }

        Ok(())
    }

    // --- Record Operations ---

    /// Append a record to a collection.
    ///
    /// `item` must serialize to a JSON object. The collection does not have
    /// to be declared in the schema.
    pub async fn insert<T: Serialize + ?Sized>(&self, collection: &str, item: &T) -> Result<()> {
        let name = CollectionName::new(collection)?;
        let record = to_record(item)?;
        self.append(&name, record).await
    }

    /// Append an already-built record.
    pub async fn insert_record(&self, collection: &str, record: Record) -> Result<()> {
        let name = CollectionName::new(collection)?;
        self.append(&name, record).await
    }

    async fn append(&self, name: &CollectionName, record: Record) -> Result<()> {
        let _gate = self.reset_gate.read().await;
        let lock = self.collection_lock(name);
        let _guard = lock.lock().await;

        let mut records = self.load_collection(name).await?;
        records.push(record);
        self.write_collection(name, &records).await?;

        let position = records.len() - 1;
        debug!(collection = %name, position, "inserted record");
        self.subscriptions
            .broadcast_inserted(name.as_str(), position, &records[position]);

        Ok(())
    }

    /// All records of a collection, oldest first.
    ///
    /// A collection that was never written reads as empty.
    pub async fn select(&self, collection: &str) -> Result<Vec<Record>> {
        let name = CollectionName::new(collection)?;
        let _gate = self.reset_gate.read().await;
        self.load_collection(&name).await
    }

    /// All records of a collection, deserialized into `T`.
    pub async fn select_as<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        self.select(collection)
            .await?
            .into_iter()
            .map(|record| {
                serde_json::from_value(Value::Object(record)).map_err(|e| {
                    StoreError::Deserialization(format!("record in '{}': {}", collection, e))
                })
            })
            .collect()
    }

    // --- Export ---

    /// Render a collection as CSV and hand it to the attached delivery.
    ///
    /// Fails with [`StoreError::NoData`] if the collection is empty.
    pub async fn export_to_csv(&self, collection: &str) -> Result<ExportReport> {
        let name = CollectionName::new(collection)?;
        let records = {
            let _gate = self.reset_gate.read().await;
            self.load_collection(&name).await?
        };

        let export = CsvExport::build(&name, &records, Timestamp::now())?;

        let delivered = match self.delivery {
            Some(ref delivery) => Some(delivery.deliver(&export).await?),
            None => None,
        };

        info!(
            collection = %name,
            filename = %export.filename,
            rows = export.rows,
            "exported collection"
        );
        self.subscriptions
            .broadcast_exported(name.as_str(), &export.filename, export.rows);

        Ok(ExportReport { export, delivered })
    }

    // --- Store Operations ---

    /// Wipe the entire backend, including keys outside the schema.
    ///
    /// The instance returns to [`SetupState::Uninitialized`]; a later
    /// `setup` seeds templates again.
    pub async fn clear(&self) -> Result<()> {
        let _gate = self.reset_gate.write().await;

        self.store.clear().await?;
        self.merged.lock().clear();
        self.locks.lock().clear();
        *self.state.write() = SetupState::Uninitialized;

        info!("cleared record store");
        self.subscriptions.broadcast_cleared();
        Ok(())
    }

    // --- Subscriptions ---

    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id)
    }

    // --- Private Helpers ---

    fn collection_lock(&self, name: &CollectionName) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.locks.lock().entry(name.clone()).or_default())
    }

    async fn load_collection(&self, name: &CollectionName) -> Result<Vec<Record>> {
        match self.store.get(name.as_str()).await? {
            Some(raw) => parse_collection(name, &raw),
            None => Ok(Vec::new()),
        }
    }

    async fn write_collection(&self, name: &CollectionName, records: &[Record]) -> Result<()> {
        let raw = serde_json::to_string(records)?;
        self.store.set(name.as_str(), &raw).await?;
        Ok(())
    }
}

impl Database<FileStore> {
    /// Open (or create) a directory-backed store and run setup.
    pub async fn open_file(config: FileStoreConfig, schema: Schema) -> Result<Self> {
        let store = FileStore::open_or_create(config)?;
        Self::open(store, schema).await
    }
}

/// Parse a stored collection, which must be a JSON array of objects.
fn parse_collection(name: &CollectionName, raw: &str) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| StoreError::corruption(name.as_str(), format!("invalid JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(StoreError::corruption(
                name.as_str(),
                format!("expected an array, found {}", json_kind(&other)),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(StoreError::corruption(
                name.as_str(),
                format!("element {} is {}, not an object", i, json_kind(&other)),
            )),
        })
        .collect()
}
