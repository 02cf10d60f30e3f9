use crate::core::credential::CredentialHasher;
use crate::core::feed::parse_feed;
use crate::core::provisioner::ModuleProvisioner;
use crate::core::report::{archive_base_name, ImportStats, RunReport, RunReporter};
use crate::core::resolver::IdentityResolver;
use crate::core::upsert::{normalize, EnrollmentOutcome, StudentUpsert, UpsertOutcome};
use crate::core::validator::{RecordValidator, ValidatedBatch, ValidatedRecord, DEFAULT_DATE_FORMATS};
use crate::domain::model::{ArchiveRequest, StudentAttributes};
use crate::domain::ports::{Archiver, Notifier, RosterStore, RunLogSink, Storage};
use crate::utils::error::{ImportError, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    Show,
    #[default]
    Hide,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerboseLog {
    On,
    #[default]
    Off,
}

/// Unit of work wrapped in one store transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionScope {
    #[default]
    Record,
    Batch,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Feed location as understood by the engine's `Storage`.
    pub feed_path: String,
    pub email_domain: String,
    pub date_formats: Vec<String>,
    pub progress: ProgressMode,
    pub verbose_log: VerboseLog,
    pub transaction_scope: TransactionScope,
    pub notification_prefix: String,
    /// Parse and validate only.
    pub dry_run: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            feed_path: "import.xml".to_string(),
            email_domain: "student.shlr.ch".to_string(),
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            progress: ProgressMode::default(),
            verbose_log: VerboseLog::default(),
            transaction_scope: TransactionScope::default(),
            notification_prefix: String::new(),
            dry_run: false,
        }
    }
}

/// Side-effecting collaborators invoked once the outcome of a run is known.
#[derive(Clone)]
pub struct Collaborators {
    pub run_log: Arc<dyn RunLogSink>,
    pub notifier: Arc<dyn Notifier>,
    /// `None` disables archival.
    pub archiver: Option<Arc<dyn Archiver>>,
}

struct PreparedRecord {
    validated: ValidatedRecord,
    attributes: StudentAttributes,
}

macro_rules! detail {
    ($self:expr, $($arg:tt)*) => {
        if $self.options.verbose_log == VerboseLog::On {
            tracing::info!($($arg)*);
        } else {
            tracing::debug!($($arg)*);
        }
    };
}

pub struct ImportEngine<S: Storage, R: RosterStore> {
    storage: S,
    store: Arc<R>,
    collaborators: Collaborators,
    hasher: CredentialHasher,
    options: ImportOptions,
}

impl<S: Storage, R: RosterStore> ImportEngine<S, R> {
    pub fn new(
        storage: S,
        store: Arc<R>,
        collaborators: Collaborators,
        options: ImportOptions,
    ) -> Result<Self> {
        Ok(Self {
            storage,
            store,
            collaborators,
            hasher: CredentialHasher::new()?,
            options,
        })
    }

    pub fn with_hasher(mut self, hasher: CredentialHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub async fn run(&self) -> RunReport {
        self.run_at(Local::now().naive_local()).await
    }

    /// Runs one batch and reports exactly one terminal outcome.
    pub async fn run_at(&self, now: NaiveDateTime) -> RunReport {
        tracing::info!("🚀 Starting Import");
        let mut reporter = RunReporter::new();

        let result = match self.prepare(&mut reporter).await {
            Ok(prepared) if self.options.dry_run => {
                reporter.stats_mut().records = prepared.len();
                Ok(())
            }
            Ok(prepared) => {
                reporter.stats_mut().records = prepared.len();
                self.apply(&prepared, now, &mut reporter)
            }
            Err(e) => Err(e),
        };

        let mut report = match result {
            Ok(()) => {
                tracing::info!("✅ Import Completed");
                reporter.success(now, self.options.dry_run)
            }
            Err(e) => {
                tracing::error!(
                    "❌ Import failed: {} (Severity: {:?})",
                    e,
                    e.severity()
                );
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
                reporter.failure(&e, now, self.options.dry_run)
            }
        };

        if !self.options.dry_run {
            self.finish(&mut report).await;
        }
        report
    }

    /// Everything that can fail on bad feed data happens here, before any write.
    async fn prepare(&self, reporter: &mut RunReporter) -> Result<Vec<PreparedRecord>> {
        tracing::info!("📁 Loading XML: {}", self.options.feed_path);
        let bytes = self
            .storage
            .read_file(&self.options.feed_path)
            .await
            .map_err(|e| ImportError::ParseError {
                message: format!("Unable to read {}: {}", self.options.feed_path, e),
            })?;

        let feed = parse_feed(&bytes)?;
        tracing::info!("Count: {}", feed.len());

        let validator = RecordValidator::new(self.store.as_ref(), &self.options.date_formats);
        let ValidatedBatch { records, warnings } = validator.validate(feed)?;
        reporter.add_warnings(warnings);

        records
            .into_iter()
            .map(|validated| -> Result<PreparedRecord> {
                let attributes =
                    normalize(&validated, &self.options.email_domain, &self.hasher)?;
                Ok(PreparedRecord {
                    validated,
                    attributes,
                })
            })
            .collect()
    }

    /// Counters are merged into the report only once their transaction commits.
    fn apply(
        &self,
        prepared: &[PreparedRecord],
        now: NaiveDateTime,
        reporter: &mut RunReporter,
    ) -> Result<()> {
        let total = prepared.len();

        match self.options.transaction_scope {
            TransactionScope::Batch => {
                let batch = self.in_transaction(|| {
                    let mut batch = ImportStats::default();
                    for record in prepared {
                        batch.merge(self.process_record(record, total, now)?);
                    }
                    Ok(batch)
                })?;
                reporter.stats_mut().merge(batch);
            }
            TransactionScope::Record => {
                for record in prepared {
                    let delta = self.in_transaction(|| self.process_record(record, total, now))?;
                    reporter.stats_mut().merge(delta);
                }
            }
        }
        Ok(())
    }

    fn in_transaction<T>(&self, work: impl FnOnce() -> Result<T>) -> Result<T> {
        self.store.begin()?;
        let outcome = work().and_then(|value| self.store.commit().map(|()| value));
        if outcome.is_err() {
            // SQLite keeps the transaction open after a failed COMMIT.
            if let Err(rollback_error) = self.store.rollback() {
                tracing::error!("Rollback failed: {}", rollback_error);
            }
        }
        outcome
    }

    fn process_record(
        &self,
        prepared: &PreparedRecord,
        total: usize,
        now: NaiveDateTime,
    ) -> Result<ImportStats> {
        let mut stats = ImportStats::default();
        let store = self.store.as_ref();
        let row = prepared.validated.row;
        let record = &prepared.validated.record;

        if self.options.progress == ProgressMode::Show {
            tracing::info!("Processing Row => {}/{}", row, total);
        }

        let existing = IdentityResolver::new(store).resolve(&record.external_id)?;
        if let Some(student) = &existing {
            detail!(
                self,
                "Row: {}, Student with ID: {} already exists",
                row,
                student.id
            );
        }

        let upsert = StudentUpsert::new(store);
        let outcome = upsert.upsert_student(
            &record.external_id,
            existing.as_ref(),
            &prepared.attributes,
            now,
        )?;
        match outcome {
            UpsertOutcome::Created(id) => {
                stats.students_created += 1;
                detail!(self, "Row: {}, Inserted New User, ID: {}", row, id);
            }
            UpsertOutcome::Updated(id) => {
                stats.students_updated += 1;
                detail!(self, "Updated User details, ID: {}", id);
            }
        }

        let Some(program_id) = store.find_program_id(&record.program_title)? else {
            tracing::warn!(
                "Row: {}, study program '{}' no longer resolves, skipping enrollment",
                row,
                record.program_title
            );
            stats.records_without_program += 1;
            return Ok(stats);
        };

        match upsert.sync_enrollment(outcome.student_id(), program_id, now)? {
            EnrollmentOutcome::Created(id) => {
                stats.enrollments_created += 1;
                detail!(self, "Inserted Data in Student Info, ID: {}", id);
            }
            EnrollmentOutcome::Updated(id) => {
                stats.enrollments_updated += 1;
                detail!(self, "Updated Student Info, ID: {}", id);
            }
        }

        if outcome.is_created() {
            let created =
                ModuleProvisioner::new(store).provision(outcome.student_id(), program_id, now)?;
            detail!(
                self,
                "Row: {}, assigned {} modules to student {}",
                row,
                created.len(),
                outcome.student_id()
            );
            stats.assignments_created += created.len();
        }

        Ok(stats)
    }

    /// Run log, notification and (on success) archival. Never changes the status.
    async fn finish(&self, report: &mut RunReport) {
        if let Err(e) = self.collaborators.run_log.append(&report.run_log_entry()) {
            tracing::error!("Unable to write run log: {}", e);
            report.collaborator_errors.push(format!("run log: {}", e));
        }

        let notification = report.notification(&self.options.notification_prefix);
        if let Err(e) = self.collaborators.notifier.notify(&notification).await {
            tracing::error!("Unable to send notification: {}", e);
            report.collaborator_errors.push(format!("notification: {}", e));
        }

        if !report.is_success() {
            return;
        }
        let Some(archiver) = &self.collaborators.archiver else {
            return;
        };

        let request = ArchiveRequest {
            source: self.options.feed_path.clone(),
            archive_name: archive_base_name(report.finished_at),
        };
        match archiver.archive(&request).await {
            Ok(location) => {
                tracing::info!("📦 Feed archived to: {}", location);
                report.archived_to = Some(location);
            }
            Err(e) => {
                tracing::error!("Unable to archive feed: {}", e);
                report.collaborator_errors.push(format!("archive: {}", e));
            }
        }
    }
}
