pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{
    archive::StorageArchiver, notify::LogNotifier, sqlite::SqliteStore, storage::LocalStorage,
};
pub use config::toml_config::ImportConfig;
pub use crate::core::etl::{Collaborators, ImportEngine, ImportOptions};
pub use crate::core::report::RunReport;
pub use utils::error::{ImportError, Result};
