use crate::core::feed::Feed;
use crate::domain::model::RawRecord;
use crate::domain::ports::RosterStore;
use crate::utils::error::{ImportError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_DATE_FORMATS: [&str; 4] = ["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Soft failure: the record is still imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordWarning {
    pub row: usize,
    pub external_id: String,
    pub empty_fields: Vec<String>,
}

impl RecordWarning {
    pub fn message(&self) -> String {
        format!("Empty entries in student details - Row:{}", self.row)
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedRecord {
    /// 1-based position in the feed.
    pub row: usize,
    pub record: RawRecord,
    pub dob: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    pub records: Vec<ValidatedRecord>,
    pub warnings: Vec<RecordWarning>,
}

/// Read-only gate run over the whole batch before anything is written.
pub struct RecordValidator<'a, R: RosterStore + ?Sized> {
    store: &'a R,
    date_formats: &'a [String],
}

impl<'a, R: RosterStore + ?Sized> RecordValidator<'a, R> {
    pub fn new(store: &'a R, date_formats: &'a [String]) -> Self {
        Self {
            store,
            date_formats,
        }
    }

    pub fn validate(&self, feed: Feed) -> Result<ValidatedBatch> {
        tracing::info!("Validating XML");

        let students = feed.students.ok_or(ImportError::NoRecordsError)?;
        let mut batch = ValidatedBatch::default();
        // 同一批次內同名學程只查一次
        let mut programs: HashMap<String, bool> = HashMap::new();

        for (index, record) in students.into_iter().enumerate() {
            let row = index + 1;

            let known = match programs.get(&record.program_title) {
                Some(known) => *known,
                None => {
                    let known = self.store.find_program_id(&record.program_title)?.is_some();
                    programs.insert(record.program_title.clone(), known);
                    known
                }
            };
            if !known {
                tracing::error!("Error: Invalid study program - Row:{}", row);
                return Err(ImportError::UnknownProgramError {
                    row,
                    title: record.program_title,
                });
            }

            let empty_fields = record.empty_fields();
            if !empty_fields.is_empty() {
                let warning = RecordWarning {
                    row,
                    external_id: record.external_id.clone(),
                    empty_fields: empty_fields.iter().map(|f| f.to_string()).collect(),
                };
                tracing::warn!(
                    "Warning: {} ({})",
                    warning.message(),
                    warning.empty_fields.join(", ")
                );
                batch.warnings.push(warning);
            }

            let dob = if record.date_of_birth.is_empty() {
                None
            } else {
                let parsed = parse_birth_date(&record.date_of_birth, self.date_formats).ok_or_else(
                    || ImportError::InvalidDateError {
                        row,
                        value: record.date_of_birth.clone(),
                    },
                )?;
                Some(parsed)
            };

            batch.records.push(ValidatedRecord { row, record, dob });
        }

        Ok(batch)
    }
}

/// Tries each configured pattern in order, then a couple of timestamp forms.
pub fn parse_birth_date<S: AsRef<str>>(value: &str, formats: &[S]) -> Option<NaiveDate> {
    let value = value.trim();

    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format.as_ref()).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|datetime| datetime.date())
        })
}
