use crate::core::validator::RecordWarning;
use crate::domain::model::{Notification, RunLogEntry, RunStatus};
use crate::utils::error::{ErrorSeverity, ImportError};
use chrono::NaiveDateTime;
use serde::Serialize;

pub const SUCCESS_MESSAGE: &str = "Successfully Imported";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub records: usize,
    pub students_created: usize,
    pub students_updated: usize,
    pub enrollments_created: usize,
    pub enrollments_updated: usize,
    pub assignments_created: usize,
    pub records_without_program: usize,
}

impl ImportStats {
    /// Adds the per-record counters of committed work.
    pub fn merge(&mut self, other: ImportStats) {
        self.students_created += other.students_created;
        self.students_updated += other.students_updated;
        self.enrollments_created += other.enrollments_created;
        self.enrollments_updated += other.enrollments_updated;
        self.assignments_created += other.assignments_created;
        self.records_without_program += other.records_without_program;
    }
}

/// Terminal result of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub message: String,
    pub period: String,
    pub finished_at: NaiveDateTime,
    pub dry_run: bool,
    pub warnings: Vec<RecordWarning>,
    pub stats: ImportStats,
    /// Set only when the consumed feed was handed to the archiver successfully.
    pub archived_to: Option<String>,
    /// Problems with the run log, notifier or archiver after the outcome was decided.
    pub collaborator_errors: Vec<String>,
    #[serde(skip)]
    pub error: Option<ImportErrorKind>,
    #[serde(skip)]
    severity: Option<ErrorSeverity>,
}

/// Which hard failure aborted the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportErrorKind {
    Parse,
    NoRecords,
    UnknownProgram { row: usize },
    InvalidDate { row: usize },
    Store,
    Other,
}

impl From<&ImportError> for ImportErrorKind {
    fn from(error: &ImportError) -> Self {
        match error {
            ImportError::ParseError { .. } | ImportError::IoError(_) => ImportErrorKind::Parse,
            ImportError::NoRecordsError => ImportErrorKind::NoRecords,
            ImportError::UnknownProgramError { row, .. } => {
                ImportErrorKind::UnknownProgram { row: *row }
            }
            ImportError::InvalidDateError { row, .. } => ImportErrorKind::InvalidDate { row: *row },
            ImportError::StoreError(_) => ImportErrorKind::Store,
            _ => ImportErrorKind::Other,
        }
    }
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Severity of the hard failure, if the run failed.
    pub fn severity(&self) -> Option<ErrorSeverity> {
        self.severity
    }

    pub fn run_log_entry(&self) -> RunLogEntry {
        RunLogEntry {
            period: self.period.clone(),
            status: self.status,
            message: self.message.clone(),
            created_at: self.finished_at,
        }
    }

    pub fn notification(&self, subject_prefix: &str) -> Notification {
        let month = self.finished_at.format("%b");
        let (subject, body) = match self.status {
            RunStatus::Success => (
                "Student Import Successful",
                format!("Database successfully updated for the month {}.", month),
            ),
            RunStatus::Failure => (
                "Student Import Failed",
                format!("Database update for the month {} failed.", month),
            ),
        };
        let subject = if subject_prefix.is_empty() {
            subject.to_string()
        } else {
            format!("{} {}", subject_prefix, subject)
        };

        Notification {
            status: self.status,
            subject,
            body,
        }
    }
}

/// `Oct-2026` style label for the run log.
pub fn period_label(at: NaiveDateTime) -> String {
    at.format("%b-%Y").to_string()
}

/// `10162026_import` style base name for the archived feed.
pub fn archive_base_name(at: NaiveDateTime) -> String {
    format!("{}_import", at.format("%m%d%Y"))
}

/// Accumulates warnings and counters while a batch runs.
#[derive(Debug, Default)]
pub struct RunReporter {
    warnings: Vec<RecordWarning>,
    stats: ImportStats,
}

impl RunReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warnings(&mut self, warnings: impl IntoIterator<Item = RecordWarning>) {
        self.warnings.extend(warnings);
    }

    pub fn stats_mut(&mut self) -> &mut ImportStats {
        &mut self.stats
    }

    pub fn success(self, at: NaiveDateTime, dry_run: bool) -> RunReport {
        let message = if dry_run {
            "Validation passed (dry run)".to_string()
        } else {
            SUCCESS_MESSAGE.to_string()
        };
        self.finish(RunStatus::Success, message, None, at, dry_run)
    }

    pub fn failure(self, error: &ImportError, at: NaiveDateTime, dry_run: bool) -> RunReport {
        let failure = (ImportErrorKind::from(error), error.severity());
        self.finish(RunStatus::Failure, error.to_string(), Some(failure), at, dry_run)
    }

    fn finish(
        self,
        status: RunStatus,
        message: String,
        failure: Option<(ImportErrorKind, ErrorSeverity)>,
        at: NaiveDateTime,
        dry_run: bool,
    ) -> RunReport {
        RunReport {
            status,
            message,
            period: period_label(at),
            finished_at: at,
            dry_run,
            warnings: self.warnings,
            stats: self.stats,
            archived_to: None,
            collaborator_errors: Vec::new(),
            error: failure.map(|(kind, _)| kind),
            severity: failure.map(|(_, severity)| severity),
        }
    }
}
