//! Property tests for store and export invariants.

use proptest::prelude::*;
use serde_json::{json, Value};
use signoff_store::{render_csv, Database, MemoryStore, Record, Schema};
use std::future::Future;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn schema() -> Schema {
    Schema::new()
        .collection("students")
        .unwrap()
        .collection("assignments")
        .unwrap()
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ,\"\n]{0,12}".prop_map(Value::String),
    ]
}

fn record() -> impl Strategy<Value = Record> {
    prop::collection::btree_map("[a-z]{1,6}", scalar(), 1..5)
        .prop_map(|fields| fields.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn insert_appends_at_end(
        existing in prop::collection::vec(record(), 0..6),
        item in record(),
    ) {
        block_on(async {
            let db = Database::open(MemoryStore::new(), schema()).await.unwrap();
            for r in &existing {
                db.insert_record("students", r.clone()).await.unwrap();
            }

            let before = db.select("students").await.unwrap();
            db.insert_record("students", item.clone()).await.unwrap();
            let after = db.select("students").await.unwrap();

            prop_assert_eq!(after.len(), before.len() + 1);
            prop_assert_eq!(&after[..before.len()], &before[..]);
            prop_assert_eq!(after.last(), Some(&item));
            Ok(())
        })?;
    }

    #[test]
    fn setup_is_idempotent(items in prop::collection::vec(record(), 0..6)) {
        block_on(async {
            let db = Database::open(MemoryStore::new(), schema()).await.unwrap();
            for r in &items {
                db.insert_record("assignments", r.clone()).await.unwrap();
            }

            let before = db.store().keys();
            let records = db.select("assignments").await.unwrap();
            db.setup().await.unwrap();
            db.setup().await.unwrap();

            prop_assert_eq!(db.store().keys(), before);
            prop_assert_eq!(db.select("assignments").await.unwrap(), records);
            Ok(())
        })?;
    }

    #[test]
    fn clear_empties_everything(
        items in prop::collection::vec(record(), 0..6),
        extra in "[a-z]{1,10}",
    ) {
        block_on(async {
            let db = Database::open(MemoryStore::new(), schema()).await.unwrap();
            for r in &items {
                db.insert_record("students", r.clone()).await.unwrap();
            }
            db.insert_record(&extra, Record::new()).await.unwrap();

            db.clear().await.unwrap();

            prop_assert!(db.store().is_empty());
            prop_assert!(db.select("students").await.unwrap().is_empty());
            prop_assert!(db.select(&extra).await.unwrap().is_empty());
            Ok(())
        })?;
    }

    #[test]
    fn unwritten_collection_reads_empty(name in "[a-z][a-z0-9_-]{0,20}") {
        block_on(async {
            let db = Database::open(MemoryStore::new(), Schema::new()).await.unwrap();
            prop_assert!(db.select(&name).await.unwrap().is_empty());
            Ok(())
        })?;
    }

    #[test]
    fn csv_rows_follow_header(records in prop::collection::vec(record(), 1..8)) {
        let content = render_csv(&records).unwrap().unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());

        let header: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        let expected: Vec<String> = records[0].keys().cloned().collect();
        prop_assert_eq!(&header, &expected);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        prop_assert_eq!(rows.len(), records.len());
        for row in &rows {
            prop_assert_eq!(row.len(), header.len());
        }
    }
}
