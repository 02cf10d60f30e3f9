mod common;

use chrono::NaiveDateTime;
use common::{feed_xml, run_time, FeedRow, Harness, MockStorage, RecordingNotifier};
use roster_import::core::etl::{Collaborators, ImportEngine, TransactionScope};
use roster_import::core::report::ImportErrorKind;
use roster_import::core::RosterStore;
use roster_import::domain::model::{Module, ProgramEnrollment, RunStatus, Student, StudentAttributes};
use roster_import::utils::error::{ErrorSeverity, ImportError, Result};
use roster_import::SqliteStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Failure injected by [`FaultyStore`].
enum Fault {
    /// Refuses to insert this external id.
    InsertStudent(String),
    /// Every COMMIT fails and leaves the transaction open.
    Commit,
    /// Program titles resolve for this many lookups, then vanish.
    ProgramVanishesAfter(usize),
}

/// Delegates to SQLite with one injected fault.
struct FaultyStore {
    inner: Arc<SqliteStore>,
    fault: Fault,
    program_lookups: AtomicUsize,
}

impl FaultyStore {
    fn new(inner: Arc<SqliteStore>, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            program_lookups: AtomicUsize::new(0),
        }
    }
}

fn simulated(code: std::os::raw::c_int, message: &str) -> ImportError {
    rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), Some(message.to_string()))
        .into()
}

impl RosterStore for FaultyStore {
    fn find_program_id(&self, title: &str) -> Result<Option<i64>> {
        let seen = self.program_lookups.fetch_add(1, Ordering::SeqCst);
        if let Fault::ProgramVanishesAfter(limit) = self.fault {
            if seen >= limit {
                return Ok(None);
            }
        }
        self.inner.find_program_id(title)
    }

    fn active_modules(&self, program_id: i64) -> Result<Vec<Module>> {
        self.inner.active_modules(program_id)
    }

    fn find_student(&self, external_id: &str) -> Result<Option<Student>> {
        self.inner.find_student(external_id)
    }

    fn insert_student(
        &self,
        external_id: &str,
        attributes: &StudentAttributes,
        now: NaiveDateTime,
    ) -> Result<i64> {
        if let Fault::InsertStudent(poisoned) = &self.fault {
            if external_id == poisoned {
                return Err(simulated(
                    rusqlite::ffi::SQLITE_CONSTRAINT,
                    "simulated constraint violation",
                ));
            }
        }
        self.inner.insert_student(external_id, attributes, now)
    }

    fn update_student(&self, id: i64, attributes: &StudentAttributes, now: NaiveDateTime) -> Result<()> {
        self.inner.update_student(id, attributes, now)
    }

    fn find_enrollment(&self, student_id: i64) -> Result<Option<ProgramEnrollment>> {
        self.inner.find_enrollment(student_id)
    }

    fn insert_enrollment(&self, student_id: i64, program_id: i64, now: NaiveDateTime) -> Result<i64> {
        self.inner.insert_enrollment(student_id, program_id, now)
    }

    fn update_enrollment(&self, enrollment_id: i64, program_id: i64, now: NaiveDateTime) -> Result<()> {
        self.inner.update_enrollment(enrollment_id, program_id, now)
    }

    fn assignment_exists(&self, student_id: i64, module_id: i64) -> Result<bool> {
        self.inner.assignment_exists(student_id, module_id)
    }

    fn insert_assignment(&self, student_id: i64, module_id: i64, now: NaiveDateTime) -> Result<i64> {
        self.inner.insert_assignment(student_id, module_id, now)
    }

    fn begin(&self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&self) -> Result<()> {
        if let Fault::Commit = self.fault {
            return Err(simulated(rusqlite::ffi::SQLITE_BUSY, "database is locked"));
        }
        self.inner.commit()
    }

    fn rollback(&self) -> Result<()> {
        self.inner.rollback()
    }
}

fn three_rows_with_poisoned_middle() -> String {
    feed_xml(&[
        FeedRow::new("1", "Informatik"),
        FeedRow::new("boom", "Informatik"),
        FeedRow::new("3", "Informatik"),
    ])
}

#[tokio::test]
async fn test_missing_student_collection_fails() {
    let harness = Harness::new("<students><note>leer</note></students>");

    let report = harness.engine(harness.options()).run_at(run_time()).await;

    assert_eq!(report.status, RunStatus::Failure);
    assert_eq!(report.message, "No student details");
    assert_eq!(report.error, Some(ImportErrorKind::NoRecords));
    assert_eq!(harness.store.run_logs().unwrap()[0].message, "No student details");
    assert_eq!(harness.notifier.sent().await.len(), 1);
}

#[tokio::test]
async fn test_malformed_feed_fails_once() {
    let harness = Harness::new("<students><student><ID>1</ID></students>");

    let report = harness.engine(harness.options()).run_at(run_time()).await;

    assert!(!report.is_success());
    assert_eq!(report.error, Some(ImportErrorKind::Parse));
    assert_eq!(report.severity(), Some(ErrorSeverity::High));
    assert_eq!(harness.store.run_logs().unwrap().len(), 1);
    assert_eq!(harness.notifier.sent().await.len(), 1);
    assert!(harness.archiver.requests().await.is_empty());
}

#[tokio::test]
async fn test_missing_feed_file_is_a_parse_failure() {
    let harness = Harness::new("<students/>");
    let mut options = harness.options();
    options.feed_path = "missing.xml".to_string();

    let report = harness.engine(options).run_at(run_time()).await;

    assert_eq!(report.error, Some(ImportErrorKind::Parse));
    assert!(report.message.contains("missing.xml"));
}

#[tokio::test]
async fn test_unparsable_birth_date_aborts_before_writes() {
    let mut bad = FeedRow::new("2", "Informatik");
    bad.geburtstag = "32.13.1999".to_string();
    let harness = Harness::new(&feed_xml(&[FeedRow::new("1", "Informatik"), bad]));

    let report = harness.engine(harness.options()).run_at(run_time()).await;

    assert_eq!(report.error, Some(ImportErrorKind::InvalidDate { row: 2 }));
    assert!(harness.store.students().unwrap().is_empty());
    assert_eq!(harness.notifier.sent().await.len(), 1);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let mut row = FeedRow::new("42", "Informatik");
    row.buergerort = String::new();
    let harness = Harness::new(&feed_xml(&[row]));
    let mut options = harness.options();
    options.dry_run = true;

    let report = harness.engine(options).run_at(run_time()).await;

    assert!(report.is_success());
    assert!(report.dry_run);
    assert_eq!(report.stats.records, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(harness.store.students().unwrap().is_empty());
    assert!(harness.store.run_logs().unwrap().is_empty());
    assert!(harness.notifier.sent().await.is_empty());
    assert!(harness.archiver.requests().await.is_empty());
}

#[tokio::test]
async fn test_store_error_with_record_scope_keeps_earlier_records() {
    let harness = Harness::new(&three_rows_with_poisoned_middle());
    let store = Arc::new(FaultyStore::new(
        harness.store.clone(),
        Fault::InsertStudent("boom".to_string()),
    ));

    let report = harness
        .engine_with_store(store, harness.options())
        .run_at(run_time())
        .await;

    assert_eq!(report.status, RunStatus::Failure);
    assert_eq!(report.error, Some(ImportErrorKind::Store));
    assert_eq!(report.severity(), Some(ErrorSeverity::Critical));

    let students = harness.store.students().unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].external_id, "1");
    assert_eq!(harness.store.enrollments().unwrap().len(), 1);
    assert_eq!(harness.store.run_logs().unwrap()[0].status.code(), 0);
    assert_eq!(report.stats.students_created, 1);
    assert_eq!(report.stats.enrollments_created, 1);
}

#[tokio::test]
async fn test_store_error_with_batch_scope_rolls_back_everything() {
    let harness = Harness::new(&three_rows_with_poisoned_middle());
    let store = Arc::new(FaultyStore::new(
        harness.store.clone(),
        Fault::InsertStudent("boom".to_string()),
    ));
    let mut options = harness.options();
    options.transaction_scope = TransactionScope::Batch;

    let report = harness
        .engine_with_store(store, options)
        .run_at(run_time())
        .await;

    assert_eq!(report.error, Some(ImportErrorKind::Store));
    assert!(harness.store.students().unwrap().is_empty());
    assert!(harness.store.enrollments().unwrap().is_empty());
    assert_eq!(harness.store.assignment_count().unwrap(), 0);
    // 失敗紀錄在回滾之後寫入
    assert_eq!(harness.store.run_logs().unwrap().len(), 1);
    // 已回滾的紀錄不計入統計
    assert_eq!(report.stats.records, 3);
    assert_eq!(report.stats.students_created, 0);
    assert_eq!(report.stats.enrollments_created, 0);
    assert_eq!(report.stats.assignments_created, 0);
}

#[tokio::test]
async fn test_failed_commit_is_rolled_back_and_logged() {
    let harness = Harness::new(&feed_xml(&[FeedRow::new("42", "Informatik")]));
    let store = Arc::new(FaultyStore::new(harness.store.clone(), Fault::Commit));

    let report = harness
        .engine_with_store(store, harness.options())
        .run_at(run_time())
        .await;

    assert_eq!(report.status, RunStatus::Failure);
    assert_eq!(report.error, Some(ImportErrorKind::Store));
    assert!(report.message.contains("database is locked"));
    assert!(report.collaborator_errors.is_empty());
    assert_eq!(report.stats.students_created, 0);

    assert!(harness.store.students().unwrap().is_empty());
    assert_eq!(harness.store.assignment_count().unwrap(), 0);
    let logs = harness.store.run_logs().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, RunStatus::Failure);

    // 連線上不應殘留未結束的交易
    harness.store.begin().unwrap();
    harness.store.rollback().unwrap();
}

#[tokio::test]
async fn test_program_vanishing_after_validation_skips_enrollment() {
    let harness = Harness::new(&feed_xml(&[FeedRow::new("42", "Informatik")]));
    // 驗證階段每個名稱只查詢一次
    let store = Arc::new(FaultyStore::new(
        harness.store.clone(),
        Fault::ProgramVanishesAfter(1),
    ));

    let report = harness
        .engine_with_store(store, harness.options())
        .run_at(run_time())
        .await;

    assert!(report.is_success());
    assert_eq!(report.stats.records_without_program, 1);
    assert_eq!(report.stats.students_created, 1);
    assert_eq!(report.stats.enrollments_created, 0);
    assert_eq!(report.stats.assignments_created, 0);

    let students = harness.store.students().unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].external_id, "42");
    assert!(harness.store.enrollments().unwrap().is_empty());
    assert_eq!(harness.store.assignment_count().unwrap(), 0);
    assert_eq!(harness.store.run_logs().unwrap()[0].status, RunStatus::Success);
}

#[tokio::test]
async fn test_notification_failure_does_not_change_status() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    store.insert_program("Informatik", true).unwrap();
    let notifier = RecordingNotifier {
        fail: true,
        ..RecordingNotifier::default()
    };
    let collaborators = Collaborators {
        run_log: store.clone(),
        notifier: Arc::new(notifier.clone()),
        archiver: None,
    };
    let storage = MockStorage::with_feed(&feed_xml(&[FeedRow::new("42", "Informatik")]));
    let options = roster_import::ImportOptions {
        feed_path: common::FEED_PATH.to_string(),
        ..Default::default()
    };

    let engine = ImportEngine::new(storage, store.clone(), collaborators, options)
        .unwrap()
        .with_hasher(common::fast_hasher());
    let report = engine.run_at(run_time()).await;

    assert!(report.is_success());
    assert_eq!(report.collaborator_errors.len(), 1);
    assert!(report.collaborator_errors[0].starts_with("notification"));
    assert_eq!(report.archived_to, None);
    assert_eq!(notifier.sent().await.len(), 1);
    assert_eq!(store.students().unwrap().len(), 1);
}
