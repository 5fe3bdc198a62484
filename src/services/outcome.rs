use crate::services::staging::StagedFile;
use serde::Serialize;
use utoipa::ToSchema;

/// Result for one uploaded part: the extracted text or the reason it failed.
///
/// Only constructible through [`OutcomeRecord::success`] and [`OutcomeRecord::failure`], so
/// exactly one of `data` and `error` is ever present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OutcomeRecord {
    filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl OutcomeRecord {
    pub fn success(filename: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn failure(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }
}

/// Slot for one part, in the order the part appeared in the request.
#[derive(Debug)]
pub enum PartOutcome {
    /// Final outcome known at ingestion time (rejected part).
    Settled(OutcomeRecord),
    /// Staged and waiting for conversion.
    Pending(StagedFile),
}

/// Append-only list of per-part outcomes for one request.
#[derive(Debug, Default)]
pub struct BatchResults {
    entries: Vec<PartOutcome>,
}

impl BatchResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&mut self, filename: impl Into<String>, reason: impl Into<String>) {
        self.entries
            .push(PartOutcome::Settled(OutcomeRecord::failure(filename, reason)));
    }

    pub fn stage(&mut self, staged: StagedFile) {
        self.entries.push(PartOutcome::Pending(staged));
    }

    /// Number of parts observed so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn staged_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, PartOutcome::Pending(_)))
            .count()
    }

    /// Deletes every staged file. Used when the whole request is abandoned.
    pub fn discard_staged(self) -> usize {
        let mut removed = 0;
        for entry in self.entries {
            if let PartOutcome::Pending(staged) = entry {
                staged.discard();
                removed += 1;
            }
        }
        removed
    }

    pub fn entries(&self) -> &[PartOutcome] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<PartOutcome> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::staging::StagingStore;
    use serde_json::json;

    #[test]
    fn test_success_serializes_without_error() {
        let record = OutcomeRecord::success("a.pdf", "hello");
        assert!(record.is_success());
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"filename": "a.pdf", "data": "hello"})
        );
    }

    #[test]
    fn test_failure_serializes_without_data() {
        let record = OutcomeRecord::failure("a.gif", "unsupported file type");
        assert!(!record.is_success());
        assert_eq!(record.error(), Some("unsupported file type"));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"filename": "a.gif", "error": "unsupported file type"})
        );
    }

    #[test]
    fn test_empty_text_is_still_data() {
        let record = OutcomeRecord::success("blank.png", "");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"filename": "blank.png", "data": ""})
        );
    }

    #[tokio::test]
    async fn test_discard_staged_removes_only_pending_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path());
        let mut results = BatchResults::new();

        results.reject("bad.txt", "unsupported file type");
        for name in ["one.pdf", "two.png"] {
            let mut writer = store.create(name).await.unwrap();
            writer.write_chunk(b"data").await.unwrap();
            results.stage(writer.finish().await.unwrap());
        }

        assert_eq!(results.len(), 3);
        assert_eq!(results.staged_count(), 2);
        assert_eq!(results.discard_staged(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
