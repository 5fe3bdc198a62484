use crate::services::converter::{OcrToolchain, TextExtractor};
use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::{error, info};

/// Builds the OCR toolchain, refusing to start when any required binary is missing.
pub async fn setup_extractor() -> Result<Arc<dyn TextExtractor>> {
    let toolchain = OcrToolchain::new();

    let missing = toolchain.missing_tools().await;
    if !missing.is_empty() {
        for tool in &missing {
            error!("❌ Application \"{}\" not found", tool);
        }
        bail!("Required OCR tools not found: {}", missing.join(", "));
    }

    info!("🔤 OCR toolchain available (ocrmypdf, pdftotext, convert, img2pdf)");
    Ok(Arc::new(toolchain))
}
