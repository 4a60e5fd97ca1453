//! Scaling and concurrency tests for the record store.
//!
//! Covers:
//! - Many concurrent inserts through one shared `Database`
//! - Concurrent inserts across several collections
//! - Growing collections on disk and exporting them
//! - Reopening a populated file store

use serde_json::json;
use signoff_store::{Database, FileStoreConfig, MemoryStore, Schema, Student};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;

/// Timing helper
struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn report_with_count(&self, count: usize) {
        let ms = self.elapsed_ms();
        println!(
            "  {} took {:.2}ms ({} items, {:.0} items/sec)",
            self.name,
            ms,
            count,
            if ms > 0.0 { count as f64 / (ms / 1000.0) } else { 0.0 }
        );
    }
}

fn schema() -> Schema {
    Schema::new()
        .collection("students")
        .unwrap()
        .collection("assignments")
        .unwrap()
}

fn file_config(dir: &TempDir) -> FileStoreConfig {
    FileStoreConfig {
        path: dir.path().join("store"),
        create_if_missing: true,
    }
}

// =============================================================================
// Concurrent inserts
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_lose_nothing() {
    const TASKS: usize = 8;
    const PER_TASK: usize = 50;

    let db = Arc::new(Database::open(MemoryStore::new(), schema()).await.unwrap());

    let timer = Timer::new("concurrent inserts");
    let mut handles = Vec::new();
    for task in 0..TASKS {
        let db = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            for i in 0..PER_TASK {
                db.insert(
                    "assignments",
                    &json!({"task": task, "seq": i, "assignmentId": format!("A{}", i)}),
                )
                .await
                .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    timer.report_with_count(TASKS * PER_TASK);

    let records = db.select("assignments").await.unwrap();
    assert_eq!(records.len(), TASKS * PER_TASK);

    let seen: HashSet<(u64, u64)> = records
        .iter()
        .map(|r| (r["task"].as_u64().unwrap(), r["seq"].as_u64().unwrap()))
        .collect();
    assert_eq!(seen.len(), TASKS * PER_TASK);

    // Each task's own records keep their relative order
    for task in 0..TASKS as u64 {
        let seqs: Vec<u64> = records
            .iter()
            .filter(|r| r["task"].as_u64() == Some(task))
            .map(|r| r["seq"].as_u64().unwrap())
            .collect();
        let mut sorted = seqs.clone();
        sorted.sort_unstable();
        assert_eq!(seqs, sorted, "task {} records out of order", task);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_across_collections() {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(Database::open_file(file_config(&dir), schema()).await.unwrap());

    let students = {
        let db = Arc::clone(&db);
        tokio::spawn(async move {
            for i in 0..40 {
                db.insert("students", &Student::new(format!("{}", i), format!("Student {}", i)))
                    .await
                    .unwrap();
            }
        })
    };
    let assignments = {
        let db = Arc::clone(&db);
        tokio::spawn(async move {
            for i in 0..40 {
                db.insert("assignments", &json!({"studentNumber": format!("{}", i)}))
                    .await
                    .unwrap();
            }
        })
    };
    students.await.unwrap();
    assignments.await.unwrap();

    assert_eq!(db.select("students").await.unwrap().len(), 40);
    assert_eq!(db.select("assignments").await.unwrap().len(), 40);
}

// =============================================================================
// Larger collections on disk
// =============================================================================

#[tokio::test]
async fn test_scaling_file_store_collection() {
    const COUNT: usize = 500;

    let dir = TempDir::new().unwrap();
    println!("\n=== Scaling: {} students on disk ===", COUNT);

    {
        let db = Database::open_file(file_config(&dir), schema()).await.unwrap();

        let timer = Timer::new("insert");
        for i in 0..COUNT {
            db.insert("students", &Student::new(format!("{:06}", i), format!("Student {}", i)))
                .await
                .unwrap();
        }
        timer.report_with_count(COUNT);

        let timer = Timer::new("export");
        let report = db.export_to_csv("students").await.unwrap();
        timer.report_with_count(report.export.rows);

        assert_eq!(report.export.rows, COUNT);
        assert_eq!(report.export.content.lines().count(), COUNT + 1);
    }

    // Reopen and verify everything survived
    let timer = Timer::new("reopen + select");
    let db = Database::open_file(file_config(&dir), schema()).await.unwrap();
    let students: Vec<Student> = db.select_as("students").await.unwrap();
    timer.report_with_count(students.len());

    assert_eq!(students.len(), COUNT);
    assert_eq!(students[0].student_number, "000000");
    assert_eq!(students[COUNT - 1].name, format!("Student {}", COUNT - 1));
}
