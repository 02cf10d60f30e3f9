use crate::domain::model::ArchiveRequest;
use crate::domain::ports::{Archiver, Storage};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

/// Moves (or zips) the consumed feed into the archive directory.
pub struct StorageArchiver<S: Storage> {
    storage: S,
    directory: String,
    compress: bool,
}

impl<S: Storage> StorageArchiver<S> {
    pub fn new(storage: S, directory: String, compress: bool) -> Self {
        Self {
            storage,
            directory,
            compress,
        }
    }

    fn target(&self, file_name: &str) -> String {
        let directory = self.directory.trim_end_matches('/');
        if directory.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", directory, file_name)
        }
    }

    fn zip_feed(entry_name: &str, feed: &[u8]) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file::<_, ()>(entry_name, FileOptions::default())?;
        zip.write_all(feed)?;
        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

#[async_trait]
impl<S: Storage> Archiver for StorageArchiver<S> {
    async fn archive(&self, request: &ArchiveRequest) -> Result<String> {
        let xml_name = format!("{}.xml", request.archive_name);

        if !self.compress {
            let target = self.target(&xml_name);
            self.storage
                .rename(&request.source, &target)
                .await
                .map_err(|e| ImportError::ArchiveError {
                    message: format!("Unable to move {} to {}: {}", request.source, target, e),
                })?;
            return Ok(target);
        }

        let target = self.target(&format!("{}.zip", request.archive_name));
        let feed = self.storage.read_file(&request.source).await?;
        let zip_data = Self::zip_feed(&xml_name, &feed)?;

        tracing::debug!("Writing archive ({} bytes) to {}", zip_data.len(), target);
        self.storage.write_file(&target, &zip_data).await?;
        self.storage.remove_file(&request.source).await?;
        Ok(target)
    }
}
