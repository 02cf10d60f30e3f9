use crate::domain::model::{
    ArchiveRequest, Module, Notification, ProgramEnrollment, RunLogEntry, Student,
    StudentAttributes,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Byte source for the feed and target for archived copies.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn rename(&self, from: &str, to: &str)
        -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Reference data plus the student, enrollment and assignment tables.
///
/// All calls are blocking. `begin`/`commit`/`rollback` delimit one logical
/// unit of work; implementations are not expected to nest them.
pub trait RosterStore: Send + Sync {
    /// Id of the single active, non-deleted program with this exact title.
    fn find_program_id(&self, title: &str) -> Result<Option<i64>>;
    /// Active, non-deleted modules of a program ordered by sort key.
    fn active_modules(&self, program_id: i64) -> Result<Vec<Module>>;

    /// Non-deleted student with the student role and this external id.
    fn find_student(&self, external_id: &str) -> Result<Option<Student>>;
    fn insert_student(
        &self,
        external_id: &str,
        attributes: &StudentAttributes,
        now: NaiveDateTime,
    ) -> Result<i64>;
    fn update_student(
        &self,
        id: i64,
        attributes: &StudentAttributes,
        now: NaiveDateTime,
    ) -> Result<()>;

    fn find_enrollment(&self, student_id: i64) -> Result<Option<ProgramEnrollment>>;
    fn insert_enrollment(&self, student_id: i64, program_id: i64, now: NaiveDateTime)
        -> Result<i64>;
    fn update_enrollment(
        &self,
        enrollment_id: i64,
        program_id: i64,
        now: NaiveDateTime,
    ) -> Result<()>;

    fn assignment_exists(&self, student_id: i64, module_id: i64) -> Result<bool>;
    fn insert_assignment(&self, student_id: i64, module_id: i64, now: NaiveDateTime)
        -> Result<i64>;

    fn begin(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;
}

/// Append-only audit trail, one entry per run.
pub trait RunLogSink: Send + Sync {
    fn append(&self, entry: &RunLogEntry) -> Result<()>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

#[async_trait]
pub trait Archiver: Send + Sync {
    /// Returns the location the feed was archived to.
    async fn archive(&self, request: &ArchiveRequest) -> Result<String>;
}
