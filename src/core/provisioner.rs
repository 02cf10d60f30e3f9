use crate::domain::ports::RosterStore;
use crate::utils::error::Result;
use chrono::NaiveDateTime;

/// Grants a freshly created student every active module of their program.
///
/// Additive only: assignments that already exist are left alone and nothing
/// is ever removed.
pub struct ModuleProvisioner<'a, R: RosterStore + ?Sized> {
    store: &'a R,
}

impl<'a, R: RosterStore + ?Sized> ModuleProvisioner<'a, R> {
    pub fn new(store: &'a R) -> Self {
        Self { store }
    }

    /// Returns the ids of the assignments created.
    pub fn provision(
        &self,
        student_id: i64,
        program_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<i64>> {
        let modules = self.store.active_modules(program_id)?;
        let mut created = Vec::new();

        for module in modules {
            if self.store.assignment_exists(student_id, module.id)? {
                continue;
            }
            let id = self.store.insert_assignment(student_id, module.id, now)?;
            tracing::debug!(
                "Inserting Student Modules, ID: {} (module {} '{}')",
                id,
                module.id,
                module.title
            );
            created.push(id);
        }

        Ok(created)
    }
}
