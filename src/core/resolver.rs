use crate::domain::model::{Student, STUDENT_ROLE};
use crate::domain::ports::RosterStore;
use crate::utils::error::Result;

/// Maps an external id to the live student that owns it.
pub struct IdentityResolver<'a, R: RosterStore + ?Sized> {
    store: &'a R,
}

impl<'a, R: RosterStore + ?Sized> IdentityResolver<'a, R> {
    pub fn new(store: &'a R) -> Self {
        Self { store }
    }

    /// Exact, case-sensitive match. Soft-deleted and non-student rows never match.
    pub fn resolve(&self, external_id: &str) -> Result<Option<Student>> {
        let found = self.store.find_student(external_id)?;

        Ok(found.filter(|student| {
            student.external_id == external_id
                && student.role == STUDENT_ROLE
                && !student.is_deleted
        }))
    }
}
