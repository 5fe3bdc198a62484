//! Streaming ingestion of multipart file parts.
//!
//! Each part is read in fixed-size chunks and written straight to the staging store, so no
//! part is ever held in memory as a whole. Two ceilings apply: one per part, which only
//! rejects that part, and one for the sum of all staged parts, which abandons the request.

use crate::config::RequestBudget;
use crate::services::outcome::BatchResults;
use crate::services::staging::{StagedFile, StagingStore, StagingWriter};
use crate::utils::validation::validate_mime_type;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

/// Size of a single read from a part stream.
pub const CHUNK_SIZE: usize = 16 * 1024;

pub const UNSUPPORTED_FILE_TYPE: &str = "unsupported file type";
pub const EMPTY_FILE: &str = "empty file";
pub const FILE_TOO_LARGE: &str = "file too large";

/// Conditions that abandon the whole request.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Request exceeds the maximum allowed size of {limit} bytes")]
    RequestTooLarge { limit: u64 },

    #[error("Upload stalled for more than {0:?}")]
    Stalled(Duration),
}

/// Tracks byte counts against a [`RequestBudget`] for one request.
#[derive(Debug)]
pub struct SizeGovernor {
    budget: RequestBudget,
    request_total: u64,
}

impl SizeGovernor {
    pub fn new(budget: RequestBudget) -> Self {
        Self {
            budget,
            request_total: 0,
        }
    }

    pub fn file_within_limit(&self, part_total: u64) -> bool {
        part_total <= self.budget.max_file_size
    }

    /// Adds a staged part to the running request total.
    pub fn commit_part(&mut self, size: u64) -> Result<(), IngestError> {
        self.request_total = self.request_total.saturating_add(size);
        if self.request_total > self.budget.max_request_size {
            return Err(IngestError::RequestTooLarge {
                limit: self.budget.max_request_size,
            });
        }
        Ok(())
    }

    pub fn request_total(&self) -> u64 {
        self.request_total
    }
}

enum PartRead {
    Staged(StagedFile),
    Empty,
    Rejected(String),
}

/// Per-request ingestion state. Never shared between requests.
pub struct IngestPipeline {
    governor: SizeGovernor,
    store: StagingStore,
    read_timeout: Duration,
    results: BatchResults,
}

impl IngestPipeline {
    pub fn new(budget: RequestBudget, store: StagingStore, read_timeout: Duration) -> Self {
        Self {
            governor: SizeGovernor::new(budget),
            store,
            read_timeout,
            results: BatchResults::new(),
        }
    }

    /// Processes one uploaded part, recording exactly one outcome for it.
    ///
    /// The reader is always consumed to its end unless the request is abandoned. On error
    /// every file staged so far by this pipeline has already been removed.
    pub async fn ingest_part<R>(
        &mut self,
        filename: &str,
        content_type: Option<&str>,
        mut reader: R,
    ) -> Result<(), IngestError>
    where
        R: AsyncRead + Unpin,
    {
        let result = self.try_ingest(filename, content_type, &mut reader).await;
        if let Err(e) = &result {
            let removed = self.abort();
            tracing::warn!(
                "🚫 Request abandoned at part '{}': {} ({} staged files removed)",
                filename,
                e,
                removed
            );
        }
        result
    }

    async fn try_ingest<R>(
        &mut self,
        filename: &str,
        content_type: Option<&str>,
        reader: &mut R,
    ) -> Result<(), IngestError>
    where
        R: AsyncRead + Unpin,
    {
        if let Err(e) = validate_mime_type(content_type) {
            tracing::info!("Rejected part '{}': {}", filename, e);
            self.results.reject(filename, UNSUPPORTED_FILE_TYPE);
            self.drain(reader).await?;
            return Ok(());
        }

        let writer = match self.store.create(filename).await {
            Ok(writer) => writer,
            Err(e) => {
                tracing::error!("Failed to create staging file for '{}': {}", filename, e);
                self.results.reject(filename, e.to_string());
                self.drain(reader).await?;
                return Ok(());
            }
        };

        match self.copy_part(reader, writer).await? {
            PartRead::Staged(staged) => {
                let size = staged.size();
                tracing::info!(
                    "📦 Staged '{}' ({} bytes) at {}",
                    filename,
                    size,
                    staged.path().display()
                );
                self.results.stage(staged);
                self.governor.commit_part(size)?;
            }
            PartRead::Empty => {
                tracing::info!("Rejected part '{}': empty", filename);
                self.results.reject(filename, EMPTY_FILE);
            }
            PartRead::Rejected(reason) => {
                tracing::warn!("Rejected part '{}': {}", filename, reason);
                self.results.reject(filename, reason);
                self.drain(reader).await?;
            }
        }

        Ok(())
    }

    async fn copy_part<R>(
        &self,
        reader: &mut R,
        mut writer: StagingWriter,
    ) -> Result<PartRead, IngestError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut part_total: u64 = 0;

        loop {
            let n = match self.read_chunk(reader, &mut buffer).await? {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    writer.discard();
                    return Ok(PartRead::Rejected(e.to_string()));
                }
            };

            part_total += n as u64;
            if !self.governor.file_within_limit(part_total) {
                writer.discard();
                return Ok(PartRead::Rejected(FILE_TOO_LARGE.to_string()));
            }

            if let Err(e) = writer.write_chunk(&buffer[..n]).await {
                writer.discard();
                return Ok(PartRead::Rejected(e.to_string()));
            }
        }

        if part_total == 0 {
            writer.discard();
            return Ok(PartRead::Empty);
        }

        match writer.finish().await {
            Ok(staged) => Ok(PartRead::Staged(staged)),
            Err(e) => Ok(PartRead::Rejected(e.to_string())),
        }
    }

    async fn read_chunk<R>(
        &self,
        reader: &mut R,
        buffer: &mut [u8],
    ) -> Result<io::Result<usize>, IngestError>
    where
        R: AsyncRead + Unpin,
    {
        timeout(self.read_timeout, reader.read(buffer))
            .await
            .map_err(|_| IngestError::Stalled(self.read_timeout))
    }

    /// Reads and throws away whatever is left of a part. Read errors end the drain quietly;
    /// the transport reports a broken body on the next part.
    async fn drain<R>(&self, reader: &mut R) -> Result<u64, IngestError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut discarded: u64 = 0;
        loop {
            match self.read_chunk(reader, &mut buffer).await? {
                Ok(0) | Err(_) => break,
                Ok(n) => discarded += n as u64,
            }
        }
        Ok(discarded)
    }

    /// Number of parts observed so far.
    pub fn parts_seen(&self) -> usize {
        self.results.len()
    }

    pub fn staged_bytes(&self) -> u64 {
        self.governor.request_total()
    }

    /// Removes every staged file and forgets all outcomes. Returns how many files were removed.
    pub fn abort(&mut self) -> usize {
        std::mem::take(&mut self.results).discard_staged()
    }

    pub fn finish(self) -> BatchResults {
        self.results
    }
}
