use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 學生角色代碼
pub const STUDENT_ROLE: i64 = 3;

/// One `<student>` entry of the feed, exactly as delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub external_id: String,
    pub lastname: String,
    pub firstname: String,
    pub matriculation_number: String,
    pub city: String,
    pub date_of_birth: String,
    pub program_title: String,
    pub login: String,
    pub password: String,
}

impl RawRecord {
    /// Feed field names paired with their values, login handle included.
    pub fn fields(&self) -> [(&'static str, &str); 9] {
        [
            ("ID", self.external_id.as_str()),
            ("name", self.lastname.as_str()),
            ("vorname", self.firstname.as_str()),
            ("matrikelnummer", self.matriculation_number.as_str()),
            ("buergerort", self.city.as_str()),
            ("geburtstag", self.date_of_birth.as_str()),
            ("studiengang", self.program_title.as_str()),
            ("benutzer", self.login.as_str()),
            ("passwort", self.password.as_str()),
        ]
    }

    /// Required fields that are empty. The login handle is optional.
    pub fn empty_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(name, value)| *name != "benutzer" && value.is_empty())
            .map(|(name, _)| name)
            .collect()
    }
}

/// Credential carried by a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Absent,
    Plain(String),
    Hashed(String),
}

impl Credential {
    pub fn from_feed(raw: &str) -> Self {
        if raw.is_empty() {
            Credential::Absent
        } else {
            Credential::Plain(raw.to_string())
        }
    }

    /// Stored form: only hashed credentials are ever persisted.
    pub fn stored_hash(&self) -> Option<&str> {
        match self {
            Credential::Hashed(hash) => Some(hash.as_str()),
            Credential::Absent | Credential::Plain(_) => None,
        }
    }
}

/// Mutable attributes written on every import of a student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentAttributes {
    pub lastname: String,
    pub firstname: String,
    pub matriculation_number: String,
    pub city: String,
    pub dob: Option<NaiveDate>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: i64,
    pub external_id: String,
    pub role: i64,
    pub lastname: String,
    pub firstname: String,
    pub matriculation_number: String,
    pub city: String,
    pub dob: Option<NaiveDate>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramEnrollment {
    pub id: i64,
    pub student_id: i64,
    pub program_id: i64,
    pub is_active: bool,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: i64,
    pub program_id: i64,
    pub title: String,
    pub sort: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAssignment {
    pub id: i64,
    pub student_id: i64,
    pub module_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Failure,
    Success,
}

impl RunStatus {
    /// Status code persisted in the run log.
    pub fn code(self) -> i64 {
        match self {
            RunStatus::Failure => 0,
            RunStatus::Success => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunLogEntry {
    pub period: String,
    pub status: RunStatus,
    pub message: String,
    pub created_at: NaiveDateTime,
}

/// Terminal message handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub status: RunStatus,
    pub subject: String,
    pub body: String,
}

/// Post-success signal that the consumed feed may go to cold storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveRequest {
    pub source: String,
    pub archive_name: String,
}
