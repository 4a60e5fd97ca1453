//! Assignment sign-offs on top of the record store.
//!
//! A sign-off starts from a scanned QR code naming a student and an
//! assignment. If the student is already known the caller confirms them;
//! otherwise a name is supplied and the student is registered first. The
//! assignment row is then stored with the time of signing.

use crate::database::{Database, ExportReport};
use crate::error::{Result, StoreError};
use crate::kv::KeyValueStore;
use crate::schema::Schema;
use crate::types::{Assignment, Student, Timestamp};
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

/// Collection holding [`Student`] records.
pub const STUDENTS: &str = "students";

/// Collection holding [`Assignment`] records.
pub const ASSIGNMENTS: &str = "assignments";

/// The two-collection schema used by the sign-off book.
pub fn schema() -> Result<Schema> {
    Schema::new().collection(STUDENTS)?.collection(ASSIGNMENTS)
}

/// Decoded contents of a sign-off QR code.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ScanPayload {
    /// Student number.
    pub student: String,
    /// Assignment identifier.
    pub assignment: String,
    /// Grading rubric, carried through untouched.
    #[serde(default)]
    pub rubric: Option<serde_json::Value>,
}

impl ScanPayload {
    /// Parse the JSON text of a scanned code.
    pub fn parse(text: &str) -> Result<Self> {
        let payload: ScanPayload = serde_json::from_str(text)
            .map_err(|e| StoreError::InvalidArgument(format!("unreadable scan payload: {}", e)))?;

        if payload.student.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "scan payload has an empty student".into(),
            ));
        }
        if payload.assignment.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "scan payload has an empty assignment".into(),
            ));
        }

        Ok(payload)
    }
}

/// Form state for a sign-off that has not been stored yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignOffDraft {
    pub student_number: String,
    pub assignment_id: String,
    pub done: bool,
    pub notes: String,
}

impl SignOffDraft {
    pub fn new(student_number: impl Into<String>, assignment_id: impl Into<String>) -> Self {
        Self {
            student_number: student_number.into(),
            assignment_id: assignment_id.into(),
            done: false,
            notes: String::new(),
        }
    }

    pub fn done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

impl From<&ScanPayload> for SignOffDraft {
    fn from(scan: &ScanPayload) -> Self {
        SignOffDraft::new(scan.student.trim(), scan.assignment.trim())
    }
}

/// A stored sign-off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignOff {
    pub student: Student,
    pub assignment: Assignment,
    /// Whether the student was registered as part of this sign-off.
    pub new_student: bool,
}

/// Students and their assignment sign-offs.
pub struct SignOffBook<S> {
    db: Database<S>,

    /// Held across the lookup, registration and insert of one sign-off.
    sign_off_lock: AsyncMutex<()>,
}

impl<S: KeyValueStore> SignOffBook<S> {
    /// Open a book over `store`, creating the collections if needed.
    pub async fn open(store: S) -> Result<Self> {
        let db = Database::open(store, schema()?).await?;
        Ok(Self::from_database(db))
    }

    /// Wrap an existing database.
    pub fn from_database(db: Database<S>) -> Self {
        Self {
            db,
            sign_off_lock: AsyncMutex::new(()),
        }
    }

    pub fn database(&self) -> &Database<S> {
        &self.db
    }

    pub fn into_database(self) -> Database<S> {
        self.db
    }

    pub async fn students(&self) -> Result<Vec<Student>> {
        self.db.select_as(STUDENTS).await
    }

    pub async fn assignments(&self) -> Result<Vec<Assignment>> {
        self.db.select_as(ASSIGNMENTS).await
    }

    /// First student with this number, if any.
    pub async fn find_student(&self, student_number: &str) -> Result<Option<Student>> {
        Ok(self
            .students()
            .await?
            .into_iter()
            .find(|s| s.student_number == student_number))
    }

    /// Store a student. Numbers are not checked for uniqueness.
    pub async fn register_student(&self, student: &Student) -> Result<()> {
        if student.student_number.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "student number must not be empty".into(),
            ));
        }
        self.db.insert(STUDENTS, student).await?;
        info!(student = %student.student_number, "registered student");
        Ok(())
    }

    /// Store a sign-off, registering the student first if unknown.
    ///
    /// `new_student_name` is only consulted when no student with the
    /// draft's number exists; it must then be non-blank.
    ///
    /// Sign-offs through one book are serialized, so a new student is
    /// registered once. The two inserts are not atomic: if storing the
    /// assignment fails, a newly registered student stays registered.
    pub async fn record_sign_off(
        &self,
        draft: SignOffDraft,
        new_student_name: Option<&str>,
    ) -> Result<SignOff> {
        if draft.assignment_id.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "assignment id must not be empty".into(),
            ));
        }

        let _guard = self.sign_off_lock.lock().await;

        let (student, new_student) = match self.find_student(&draft.student_number).await? {
            Some(student) => (student, false),
            None => {
                let name = new_student_name
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        StoreError::InvalidArgument(format!(
                            "student {} is unknown and no name was given",
                            draft.student_number
                        ))
                    })?;
                let student = Student::new(draft.student_number.clone(), name);
                self.register_student(&student).await?;
                (student, true)
            }
        };

        let assignment = Assignment {
            student_number: student.student_number.clone(),
            assignment_id: draft.assignment_id,
            done: draft.done,
            notes: draft.notes,
            timestamp: Timestamp::now(),
        };
        self.db.insert(ASSIGNMENTS, &assignment).await?;

        debug!(
            student = %assignment.student_number,
            assignment = %assignment.assignment_id,
            done = assignment.done,
            "recorded sign-off"
        );

        Ok(SignOff {
            student,
            assignment,
            new_student,
        })
    }

    /// Sign-offs for one student, oldest first.
    pub async fn sign_offs_for(&self, student_number: &str) -> Result<Vec<Assignment>> {
        Ok(self
            .assignments()
            .await?
            .into_iter()
            .filter(|a| a.student_number == student_number)
            .collect())
    }

    pub async fn export_students(&self) -> Result<ExportReport> {
        self.db.export_to_csv(STUDENTS).await
    }

    pub async fn export_assignments(&self) -> Result<ExportReport> {
        self.db.export_to_csv(ASSIGNMENTS).await
    }

    /// Wipe all stored data and recreate the empty collections.
    pub async fn reset(&self) -> Result<()> {
        self.db.clear().await?;
        self.db.setup().await
    }
}
