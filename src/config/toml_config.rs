use crate::core::etl::{ImportOptions, ProgressMode, TransactionScope, VerboseLog};
use crate::core::validator::DEFAULT_DATE_FORMATS;
use crate::utils::error::{ImportError, Result};
use crate::utils::validation::{
    validate_date_formats, validate_email_domain, validate_path, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub feed: FeedConfig,
    pub store: StoreConfig,
    pub student: StudentConfig,
    pub archive: ArchiveConfig,
    pub output: OutputConfig,
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// 匯入與封存路徑的根目錄
    pub base_dir: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentConfig {
    pub email_domain: String,
    pub date_formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub directory: String,
    pub compress: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub progress: ProgressMode,
    pub verbose_log: VerboseLog,
    pub transaction_scope: TransactionScope,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub recipients: Vec<String>,
    pub subject_prefix: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_dir: "import".to_string(),
            path: "import.xml".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "roster.db".to_string(),
        }
    }
}

impl Default for StudentConfig {
    fn default() -> Self {
        Self {
            email_domain: "student.shlr.ch".to_string(),
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: "archive".to_string(),
            compress: false,
        }
    }
}

impl ImportConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ImportError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ImportError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${IMPORT_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ImportError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_path("feed.base_dir", &self.feed.base_dir)?;
        validate_path("feed.path", &self.feed.path)?;
        validate_path("store.database_path", &self.store.database_path)?;
        validate_email_domain("student.email_domain", &self.student.email_domain)?;
        validate_date_formats("student.date_formats", &self.student.date_formats)?;

        if self.archive.enabled {
            validate_path("archive.directory", &self.archive.directory)?;
        }

        Ok(())
    }

    /// Engine options derived from this configuration.
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            feed_path: self.feed.path.clone(),
            email_domain: self.student.email_domain.clone(),
            date_formats: self.student.date_formats.clone(),
            progress: self.output.progress,
            verbose_log: self.output.verbose_log,
            transaction_scope: self.output.transaction_scope,
            notification_prefix: self.notification.subject_prefix.clone(),
            dry_run: false,
        }
    }
}

impl Validate for ImportConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
