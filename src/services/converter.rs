use crate::services::language::LanguageSelection;
use crate::services::outcome::{BatchResults, OutcomeRecord, PartOutcome};
use crate::services::staging::StagedFile;
use anyhow::{Result, anyhow};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Which toolchain pipeline a staged file goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// OCR the document directly.
    Pdf,
    /// Grayscale, wrap into a PDF, then OCR.
    Image,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Self {
        if ext.eq_ignore_ascii_case(".pdf") {
            DocumentKind::Pdf
        } else {
            DocumentKind::Image
        }
    }
}

/// Trait for text extraction backends
#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract plain text from the file at `path`. The error text is reported to the client
    /// as is.
    async fn extract(
        &self,
        path: &Path,
        kind: DocumentKind,
        languages: &LanguageSelection,
    ) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;
}

/// Binaries the shell pipelines depend on.
pub const REQUIRED_TOOLS: &[&str] = &["ocrmypdf", "pdftotext", "convert", "img2pdf"];

// `$1` is the staged file, `$2` the language selector. Both stay out of the script text.
const PDF_PIPELINE: &str = "{ ocrmypdf --language \"$2\" --quiet --force-ocr --optimize 0 \
    --rotate-pages --deskew \"$1\" - | pdftotext -layout - - ; } 2>&1";

const IMAGE_PIPELINE: &str = "{ convert \"$1\" -colorspace Gray - | img2pdf - | \
    ocrmypdf --language \"$2\" --quiet --force-ocr --optimize 0 --rotate-pages --deskew - - | \
    pdftotext -layout - - ; } 2>&1";

/// ocrmypdf + poppler + ImageMagick pipelines run through `/bin/sh`.
pub struct OcrToolchain {
    shell: String,
}

impl OcrToolchain {
    pub fn new() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
        }
    }

    fn pipeline(kind: DocumentKind) -> &'static str {
        match kind {
            DocumentKind::Pdf => PDF_PIPELINE,
            DocumentKind::Image => IMAGE_PIPELINE,
        }
    }

    /// Returns the required tools that cannot be resolved on `PATH`.
    pub async fn missing_tools(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for tool in REQUIRED_TOOLS {
            let found = Command::new(&self.shell)
                .arg("-c")
                .arg("command -v \"$1\"")
                .arg("sh")
                .arg(tool)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|status| status.success())
                .unwrap_or(false);
            if !found {
                missing.push(*tool);
            }
        }
        missing
    }
}

impl Default for OcrToolchain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TextExtractor for OcrToolchain {
    async fn extract(
        &self,
        path: &Path,
        kind: DocumentKind,
        languages: &LanguageSelection,
    ) -> Result<String> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(Self::pipeline(kind))
            .arg("webocrd")
            .arg(path)
            .arg(languages.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow!("Failed to start OCR pipeline: {}", e))?;

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        let text = String::from_utf8_lossy(&combined).into_owned();

        if !output.status.success() {
            return Err(anyhow!(text));
        }

        Ok(text)
    }

    async fn health_check(&self) -> bool {
        self.missing_tools().await.is_empty()
    }
}

/// Converts every staged part of a batch, in part order, one at a time.
///
/// Parts rejected during ingestion pass through untouched. Each staged file is deleted as
/// soon as its conversion attempt ends, whatever the outcome.
pub async fn convert_batch(
    extractor: &dyn TextExtractor,
    results: BatchResults,
    languages: &LanguageSelection,
) -> Vec<OutcomeRecord> {
    let mut records = Vec::with_capacity(results.len());

    for entry in results.into_entries() {
        let record = match entry {
            PartOutcome::Settled(record) => record,
            PartOutcome::Pending(staged) => convert_one(extractor, staged, languages).await,
        };
        records.push(record);
    }

    records
}

async fn convert_one(
    extractor: &dyn TextExtractor,
    staged: StagedFile,
    languages: &LanguageSelection,
) -> OutcomeRecord {
    let kind = DocumentKind::from_extension(&staged.extension());
    tracing::info!(
        "🔎 Recognizing {} ({} bytes, {:?}, lang={})",
        staged.original_name(),
        staged.size(),
        kind,
        languages
    );

    let result = extractor.extract(staged.path(), kind, languages).await;
    let filename = staged.original_name().to_string();
    staged.discard();

    match result {
        Ok(text) => OutcomeRecord::success(filename, text),
        Err(e) => {
            tracing::warn!("OCR failed for {}: {}", filename, e);
            OutcomeRecord::failure(filename, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::staging::StagingStore;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Echoes the staged bytes back, failing for files whose content starts with "fail".
    struct EchoExtractor {
        seen: Mutex<Vec<(PathBuf, DocumentKind, String, bool)>>,
    }

    #[async_trait::async_trait]
    impl TextExtractor for EchoExtractor {
        async fn extract(
            &self,
            path: &Path,
            kind: DocumentKind,
            languages: &LanguageSelection,
        ) -> Result<String> {
            let exists = path.exists();
            self.seen.lock().unwrap().push((
                path.to_path_buf(),
                kind,
                languages.to_string(),
                exists,
            ));
            let content = tokio::fs::read_to_string(path).await?;
            if content.starts_with("fail") {
                return Err(anyhow!("ocrmypdf: {}", content));
            }
            Ok(content)
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    async fn stage(store: &StagingStore, name: &str, content: &str) -> StagedFile {
        let mut writer = store.create(name).await.unwrap();
        writer.write_chunk(content.as_bytes()).await.unwrap();
        writer.finish().await.unwrap()
    }

    #[test]
    fn test_document_kind_from_extension() {
        assert_eq!(DocumentKind::from_extension(".pdf"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_extension(".PDF"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_extension(".png"), DocumentKind::Image);
        assert_eq!(DocumentKind::from_extension(""), DocumentKind::Image);
    }

    #[test]
    fn test_pipelines_take_positional_arguments() {
        for kind in [DocumentKind::Pdf, DocumentKind::Image] {
            let script = OcrToolchain::pipeline(kind);
            assert!(script.contains("\"$1\""));
            assert!(script.contains("--language \"$2\""));
            assert!(script.ends_with("2>&1"));
        }
        assert!(OcrToolchain::pipeline(DocumentKind::Image).starts_with("{ convert"));
    }

    #[tokio::test]
    async fn test_convert_batch_keeps_part_order_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::new(dir.path());
        let extractor = EchoExtractor {
            seen: Mutex::new(Vec::new()),
        };

        let mut results = BatchResults::new();
        results.stage(stage(&store, "first.pdf", "page one").await);
        results.reject("notes.txt", "unsupported file type");
        results.stage(stage(&store, "second.PNG", "fail: bad image").await);
        results.stage(stage(&store, "third.tiff", "page three").await);

        let languages = LanguageSelection::from_fields(["eng,rus"]);
        let records = convert_batch(&extractor, results, &languages).await;

        assert_eq!(records.len(), 4);
        assert_eq!(records[0], OutcomeRecord::success("first.pdf", "page one"));
        assert_eq!(
            records[1],
            OutcomeRecord::failure("notes.txt", "unsupported file type")
        );
        assert_eq!(
            records[2],
            OutcomeRecord::failure("second.PNG", "ocrmypdf: fail: bad image")
        );
        assert_eq!(records[3], OutcomeRecord::success("third.tiff", "page three"));

        let seen = extractor.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].1, DocumentKind::Pdf);
        assert_eq!(seen[1].1, DocumentKind::Image);
        assert!(seen.iter().all(|(_, _, lang, existed)| lang == "eng+rus" && *existed));
        assert!(seen.iter().all(|(path, _, _, _)| !path.exists()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
