//! Temporary on-disk staging of uploaded parts.
//!
//! Every path handed out by [`StagingStore`] is wrapped in a [`TempPath`] the moment the file
//! exists, so ownership decides deletion: whoever ends up holding the [`StagingWriter`] or
//! [`StagedFile`] removes the file when it is discarded or dropped, on every exit path.

use crate::utils::validation::normalized_extension;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Allocates uniquely named files inside a directory shared by all concurrent requests.
#[derive(Debug, Clone)]
pub struct StagingStore {
    dir: PathBuf,
}

impl StagingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates an empty staging file for a part named `original_name`.
    ///
    /// The file name is a random UUID plus the lower-cased original extension. The file is
    /// opened with create-new semantics, so a collision fails instead of clobbering another
    /// request's data.
    pub async fn create(&self, original_name: &str) -> io::Result<StagingWriter> {
        let path = self.dir.join(format!(
            "{}{}",
            Uuid::new_v4(),
            normalized_extension(original_name)
        ));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        let path = match TempPath::try_from_path(&path) {
            Ok(temp_path) => temp_path,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }
        };

        Ok(StagingWriter {
            file,
            path,
            original_name: original_name.to_string(),
            size: 0,
        })
    }
}

/// A staging file that is still being written.
pub struct StagingWriter {
    file: File,
    path: TempPath,
    original_name: String,
    size: u64,
}

impl StagingWriter {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Flushes and closes the file handle, keeping the file for a later consumer.
    pub async fn finish(mut self) -> io::Result<StagedFile> {
        self.file.flush().await?;
        drop(self.file);

        Ok(StagedFile {
            original_name: self.original_name,
            path: self.path,
            size: self.size,
        })
    }

    /// Closes the handle and removes the partially written file.
    pub fn discard(self) {
        drop(self.file);
        remove(self.path);
    }
}

/// A fully written part waiting for conversion. Dropping it deletes the file.
#[derive(Debug)]
pub struct StagedFile {
    original_name: String,
    path: TempPath,
    size: u64,
}

impl StagedFile {
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Lower-cased extension of the staged path, including the dot.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default()
    }

    pub fn discard(self) {
        remove(self.path);
    }
}

fn remove(path: TempPath) {
    let shown = path.display().to_string();
    match path.close() {
        Ok(()) => tracing::debug!("🧹 Removed staged file {}", shown),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove staged file {}: {}", shown, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_stage_and_discard() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path());

        let mut writer = store.create("Scan.PDF").await.unwrap();
        writer.write_chunk(b"%PDF-1.7").await.unwrap();
        writer.write_chunk(b" body").await.unwrap();
        assert_eq!(writer.size(), 13);

        let staged = writer.finish().await.unwrap();
        assert_eq!(staged.original_name(), "Scan.PDF");
        assert_eq!(staged.size(), 13);
        assert_eq!(staged.extension(), ".pdf");
        assert!(staged.path().starts_with(dir.path()));
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"%PDF-1.7 body");

        staged.discard();
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_discarded_writer_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path());

        let mut writer = store.create("page.png").await.unwrap();
        writer.write_chunk(&[0u8; 128]).await.unwrap();
        assert_eq!(file_count(dir.path()), 1);

        writer.discard();
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_dropped_staged_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path());

        let mut writer = store.create("page.tiff").await.unwrap();
        writer.write_chunk(b"II*\0").await.unwrap();
        let staged = writer.finish().await.unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_same_name_gets_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path());

        let first = store.create("same.pdf").await.unwrap();
        let second = store.create("same.pdf").await.unwrap();
        assert_ne!(first.path.to_path_buf(), second.path.to_path_buf());

        first.discard();
        second.discard();
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_create_fails_for_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path().join("missing"));
        assert!(store.create("a.pdf").await.is_err());
    }
}
