use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Unable to load XML feed: {message}")]
    ParseError { message: String },

    #[error("No student details")]
    NoRecordsError,

    #[error("Invalid study program - Row:{row}")]
    UnknownProgramError { row: usize, title: String },

    #[error("Invalid date of birth '{value}' - Row:{row}")]
    InvalidDateError { row: usize, value: String },

    #[error("Database error: {0}")]
    StoreError(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Password hashing failed: {message}")]
    HashError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Archive error: {message}")]
    ArchiveError { message: String },

    #[error("Notification error: {message}")]
    NotificationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ImportError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ImportError::NotificationError { .. } | ImportError::ArchiveError { .. } => {
                ErrorSeverity::Low
            }
            ImportError::ConfigError { .. }
            | ImportError::MissingConfigError { .. }
            | ImportError::InvalidConfigValueError { .. } => ErrorSeverity::Medium,
            ImportError::ParseError { .. }
            | ImportError::NoRecordsError
            | ImportError::UnknownProgramError { .. }
            | ImportError::InvalidDateError { .. }
            | ImportError::HashError { .. } => ErrorSeverity::High,
            ImportError::StoreError(_)
            | ImportError::IoError(_)
            | ImportError::ZipError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ImportError::ParseError { .. } => {
                "The import feed could not be read or is not well-formed XML".to_string()
            }
            ImportError::NoRecordsError => "The import feed contains no student entries".to_string(),
            ImportError::UnknownProgramError { row, title } => {
                format!("Row {} references unknown study program '{}'", row, title)
            }
            ImportError::InvalidDateError { row, value } => {
                format!("Row {} has an unreadable date of birth '{}'", row, value)
            }
            ImportError::StoreError(_) => "The student database rejected the import".to_string(),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ImportError::ParseError { .. } => "Check that the feed file exists and is valid XML",
            ImportError::NoRecordsError => "Make sure the feed contains <student> elements",
            ImportError::UnknownProgramError { .. } => {
                "Create or activate the study program, or correct the feed entry"
            }
            ImportError::InvalidDateError { .. } => {
                "Correct the date or add its pattern to student.date_formats"
            }
            ImportError::ConfigError { .. }
            | ImportError::MissingConfigError { .. }
            | ImportError::InvalidConfigValueError { .. } => "Review the configuration file",
            ImportError::StoreError(_) => "Check database connectivity and schema",
            _ => "Inspect the log output for details",
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
