//! SQLite-backed roster store and run log.

use crate::domain::model::{
    Module, ProgramEnrollment, RunLogEntry, RunStatus, Student, StudentAttributes,
    STUDENT_ROLE,
};
use crate::domain::ports::{RosterStore, RunLogSink};
use crate::utils::error::Result;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS study_programs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    is_active   INTEGER NOT NULL DEFAULT 1,
    is_deleted  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS modules (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    program_id  INTEGER NOT NULL REFERENCES study_programs(id),
    title       TEXT NOT NULL,
    sort        INTEGER NOT NULL DEFAULT 0,
    is_active   INTEGER NOT NULL DEFAULT 1,
    is_deleted  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS students (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id           TEXT,
    role                  INTEGER NOT NULL,
    lastname              TEXT NOT NULL,
    firstname             TEXT NOT NULL,
    matriculation_number  TEXT NOT NULL,
    city                  TEXT NOT NULL,
    dob                   TEXT,
    email                 TEXT,
    password_hash         TEXT,
    is_active             INTEGER NOT NULL DEFAULT 1,
    is_deleted            INTEGER NOT NULL DEFAULT 0,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_students_live_external_id
    ON students(external_id) WHERE is_deleted = 0 AND role = 3;

CREATE TABLE IF NOT EXISTS program_enrollments (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id  INTEGER NOT NULL REFERENCES students(id),
    program_id  INTEGER NOT NULL REFERENCES study_programs(id),
    is_active   INTEGER NOT NULL DEFAULT 1,
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_enrollments_live_student
    ON program_enrollments(student_id) WHERE is_deleted = 0;

CREATE TABLE IF NOT EXISTS module_assignments (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id  INTEGER NOT NULL REFERENCES students(id),
    module_id   INTEGER NOT NULL REFERENCES modules(id),
    is_active   INTEGER NOT NULL DEFAULT 1,
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_live_pair
    ON module_assignments(student_id, module_id) WHERE is_active = 1 AND is_deleted = 0;

CREATE TABLE IF NOT EXISTS run_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    period      TEXT NOT NULL,
    status      INTEGER NOT NULL,
    message     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
"#;

const STUDENT_COLUMNS: &str = "id, external_id, role, lastname, firstname, matriculation_number, \
     city, dob, email, password_hash, is_active, is_deleted, created_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection and makes sure the schema exists.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    // Reference data maintenance. The import itself only reads these tables.

    pub fn insert_program(&self, title: &str, is_active: bool) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO study_programs (title, is_active) VALUES (?1, ?2)",
            params![title, is_active],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn delete_program(&self, id: i64) -> Result<()> {
        self.conn().execute(
            "UPDATE study_programs SET is_deleted = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    pub fn insert_module(
        &self,
        program_id: i64,
        title: &str,
        sort: i64,
        is_active: bool,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO modules (program_id, title, sort, is_active) VALUES (?1, ?2, ?3, ?4)",
            params![program_id, title, sort, is_active],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn delete_student(&self, id: i64) -> Result<()> {
        self.conn().execute(
            "UPDATE students SET is_deleted = 1, updated_at = ?2 WHERE id = ?1",
            params![id, Self::now()],
        )?;
        Ok(())
    }

    // Read helpers for reporting and inspection.

    pub fn students(&self) -> Result<Vec<Student>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM students ORDER BY id", STUDENT_COLUMNS))?;
        let students = stmt
            .query_map([], student_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(students)
    }

    pub fn enrollments(&self) -> Result<Vec<ProgramEnrollment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, student_id, program_id, is_active, is_deleted \
             FROM program_enrollments ORDER BY id",
        )?;
        let enrollments = stmt
            .query_map([], enrollment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(enrollments)
    }

    /// Module ids assigned to a student, in assignment order.
    pub fn assigned_modules(&self, student_id: i64) -> Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT module_id FROM module_assignments \
             WHERE student_id = ?1 AND is_active = 1 AND is_deleted = 0 ORDER BY id",
        )?;
        let modules = stmt
            .query_map(params![student_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(modules)
    }

    pub fn assignment_count(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM module_assignments", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn run_logs(&self) -> Result<Vec<RunLogEntry>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT period, status, message, created_at FROM run_logs ORDER BY id")?;
        let entries = stmt
            .query_map([], |row| {
                let status: i64 = row.get("status")?;
                Ok(RunLogEntry {
                    period: row.get("period")?,
                    status: if status == 1 {
                        RunStatus::Success
                    } else {
                        RunStatus::Failure
                    },
                    message: row.get("message")?,
                    created_at: row.get("created_at")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get("id")?,
        external_id: row.get::<_, Option<String>>("external_id")?.unwrap_or_default(),
        role: row.get("role")?,
        lastname: row.get("lastname")?,
        firstname: row.get("firstname")?,
        matriculation_number: row.get("matriculation_number")?,
        city: row.get("city")?,
        dob: row.get("dob")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        is_active: row.get("is_active")?,
        is_deleted: row.get("is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn enrollment_from_row(row: &Row<'_>) -> rusqlite::Result<ProgramEnrollment> {
    Ok(ProgramEnrollment {
        id: row.get("id")?,
        student_id: row.get("student_id")?,
        program_id: row.get("program_id")?,
        is_active: row.get("is_active")?,
        is_deleted: row.get("is_deleted")?,
    })
}

impl RosterStore for SqliteStore {
    fn find_program_id(&self, title: &str) -> Result<Option<i64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id FROM study_programs \
             WHERE title = ?1 AND is_active = 1 AND is_deleted = 0 LIMIT 2",
        )?;
        let ids = stmt
            .query_map(params![title], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // 同名學程超過一筆時視為無法解析
        match ids.as_slice() {
            [id] => Ok(Some(*id)),
            [] => Ok(None),
            _ => {
                tracing::warn!("Study program title '{}' is ambiguous", title);
                Ok(None)
            }
        }
    }

    fn active_modules(&self, program_id: i64) -> Result<Vec<Module>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, program_id, title, sort FROM modules \
             WHERE program_id = ?1 AND is_active = 1 AND is_deleted = 0 \
             ORDER BY sort ASC, id ASC",
        )?;
        let modules = stmt
            .query_map(params![program_id], |row| {
                Ok(Module {
                    id: row.get("id")?,
                    program_id: row.get("program_id")?,
                    title: row.get("title")?,
                    sort: row.get("sort")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(modules)
    }

    fn find_student(&self, external_id: &str) -> Result<Option<Student>> {
        let student = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {} FROM students \
                     WHERE external_id = ?1 AND role = ?2 AND is_deleted = 0",
                    STUDENT_COLUMNS
                ),
                params![external_id, STUDENT_ROLE],
                student_from_row,
            )
            .optional()?;
        Ok(student)
    }

    fn insert_student(
        &self,
        external_id: &str,
        attributes: &StudentAttributes,
        now: NaiveDateTime,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO students (external_id, role, lastname, firstname, matriculation_number, \
             city, dob, email, password_hash, is_active, is_deleted, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, 0, ?10, ?10)",
            params![
                external_id,
                STUDENT_ROLE,
                attributes.lastname,
                attributes.firstname,
                attributes.matriculation_number,
                attributes.city,
                attributes.dob,
                attributes.email,
                attributes.password_hash,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_student(
        &self,
        id: i64,
        attributes: &StudentAttributes,
        now: NaiveDateTime,
    ) -> Result<()> {
        self.conn().execute(
            "UPDATE students SET lastname = ?2, firstname = ?3, matriculation_number = ?4, \
             city = ?5, dob = ?6, email = ?7, password_hash = ?8, updated_at = ?9 WHERE id = ?1",
            params![
                id,
                attributes.lastname,
                attributes.firstname,
                attributes.matriculation_number,
                attributes.city,
                attributes.dob,
                attributes.email,
                attributes.password_hash,
                now,
            ],
        )?;
        Ok(())
    }

    fn find_enrollment(&self, student_id: i64) -> Result<Option<ProgramEnrollment>> {
        let enrollment = self
            .conn()
            .query_row(
                "SELECT id, student_id, program_id, is_active, is_deleted \
                 FROM program_enrollments WHERE student_id = ?1 AND is_deleted = 0",
                params![student_id],
                enrollment_from_row,
            )
            .optional()?;
        Ok(enrollment)
    }

    fn insert_enrollment(
        &self,
        student_id: i64,
        program_id: i64,
        now: NaiveDateTime,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO program_enrollments (student_id, program_id, is_active, is_deleted, \
             created_at, updated_at) VALUES (?1, ?2, 1, 0, ?3, ?3)",
            params![student_id, program_id, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_enrollment(
        &self,
        enrollment_id: i64,
        program_id: i64,
        now: NaiveDateTime,
    ) -> Result<()> {
        self.conn().execute(
            "UPDATE program_enrollments SET program_id = ?2, updated_at = ?3 WHERE id = ?1",
            params![enrollment_id, program_id, now],
        )?;
        Ok(())
    }

    fn assignment_exists(&self, student_id: i64, module_id: i64) -> Result<bool> {
        let exists = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM module_assignments \
             WHERE student_id = ?1 AND module_id = ?2 AND is_active = 1 AND is_deleted = 0)",
            params![student_id, module_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_assignment(
        &self,
        student_id: i64,
        module_id: i64,
        now: NaiveDateTime,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO module_assignments (student_id, module_id, is_active, is_deleted, \
             created_at, updated_at) VALUES (?1, ?2, 1, 0, ?3, ?3)",
            params![student_id, module_id, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn begin(&self) -> Result<()> {
        self.conn().execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.conn().execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.conn().execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl RunLogSink for SqliteStore {
    fn append(&self, entry: &RunLogEntry) -> Result<()> {
        self.conn().execute(
            "INSERT INTO run_logs (period, status, message, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![entry.period, entry.status.code(), entry.message, entry.created_at],
        )?;
        Ok(())
    }
}
