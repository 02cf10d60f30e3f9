use crate::core::credential::CredentialHasher;
use crate::core::validator::ValidatedRecord;
use crate::domain::model::{Credential, Student, StudentAttributes};
use crate::domain::ports::RosterStore;
use crate::utils::error::Result;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(i64),
    Updated(i64),
}

impl UpsertOutcome {
    pub fn student_id(self) -> i64 {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Updated(id) => id,
        }
    }

    pub fn is_created(self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    Created(i64),
    Updated(i64),
}

/// Builds the stored form of a record: email from the login handle, hashed password.
pub fn normalize(
    validated: &ValidatedRecord,
    email_domain: &str,
    hasher: &CredentialHasher,
) -> Result<StudentAttributes> {
    let record = &validated.record;

    let email = if record.login.is_empty() {
        None
    } else {
        Some(format!("{}@{}", record.login, email_domain))
    };

    let credential = hasher.seal(Credential::from_feed(&record.password))?;

    Ok(StudentAttributes {
        lastname: record.lastname.clone(),
        firstname: record.firstname.clone(),
        matriculation_number: record.matriculation_number.clone(),
        city: record.city.clone(),
        dob: validated.dob,
        email,
        password_hash: credential.stored_hash().map(str::to_string),
    })
}

pub struct StudentUpsert<'a, R: RosterStore + ?Sized> {
    store: &'a R,
}

impl<'a, R: RosterStore + ?Sized> StudentUpsert<'a, R> {
    pub fn new(store: &'a R) -> Self {
        Self { store }
    }

    /// Overwrites an existing student in place, or creates a new one.
    pub fn upsert_student(
        &self,
        external_id: &str,
        existing: Option<&Student>,
        attributes: &StudentAttributes,
        now: NaiveDateTime,
    ) -> Result<UpsertOutcome> {
        match existing {
            Some(student) => {
                self.store.update_student(student.id, attributes, now)?;
                Ok(UpsertOutcome::Updated(student.id))
            }
            None => {
                let id = self.store.insert_student(external_id, attributes, now)?;
                Ok(UpsertOutcome::Created(id))
            }
        }
    }

    /// Keeps exactly one live enrollment per student, pointing at `program_id`.
    pub fn sync_enrollment(
        &self,
        student_id: i64,
        program_id: i64,
        now: NaiveDateTime,
    ) -> Result<EnrollmentOutcome> {
        match self.store.find_enrollment(student_id)? {
            Some(enrollment) => {
                if enrollment.program_id != program_id {
                    tracing::debug!(
                        "Student {} moves from program {} to {}",
                        student_id,
                        enrollment.program_id,
                        program_id
                    );
                }
                self.store.update_enrollment(enrollment.id, program_id, now)?;
                Ok(EnrollmentOutcome::Updated(enrollment.id))
            }
            None => {
                let id = self.store.insert_enrollment(student_id, program_id, now)?;
                Ok(EnrollmentOutcome::Created(id))
            }
        }
    }
}
