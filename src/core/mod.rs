pub mod credential;
pub mod etl;
pub mod feed;
pub mod provisioner;
pub mod report;
pub mod resolver;
pub mod upsert;
pub mod validator;

pub use crate::domain::model::{RawRecord, RunStatus, Student};
pub use crate::domain::ports::{Archiver, Notifier, RosterStore, RunLogSink, Storage};
pub use crate::utils::error::Result;
