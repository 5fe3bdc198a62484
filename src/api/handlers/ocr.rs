use crate::AppState;
use crate::api::error::AppError;
use crate::services::converter::convert_batch;
use crate::services::ingest::IngestPipeline;
use crate::services::language::LanguageSelection;
use crate::services::outcome::OutcomeRecord;
use axum::{
    Json,
    extract::{Multipart, State, multipart::Field},
};
use futures::TryStreamExt;
use tokio::time::timeout;
use tokio_util::io::StreamReader;

/// Form field carrying comma-separated recognition languages.
pub const LANG_FIELD: &str = "lang";

/// Longest `lang` value kept; the rest of the field is skipped.
const MAX_LANG_FIELD_LEN: usize = 1024;

#[utoipa::path(
    post,
    path = "/api/v1/ocr",
    request_body(content = Multipart, description = "Documents (PDF, JPEG, PNG, TIFF) and an optional `lang` field such as `rus,eng`"),
    responses(
        (status = 200, description = "One result per uploaded file, in upload order", body = [OutcomeRecord]),
        (status = 400, description = "Malformed multipart body"),
        (status = 408, description = "Upload stalled"),
        (status = 413, description = "Uploaded files exceed the request size limit")
    ),
    tag = "ocr"
)]
pub async fn recognize(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<OutcomeRecord>>, AppError> {
    let mut pipeline = IngestPipeline::new(
        state.config.budget,
        state.staging.clone(),
        state.config.read_timeout,
    );
    let mut lang_values: Vec<String> = Vec::new();

    // Capture errors so the remaining multipart stream can still be consumed
    let ingested: Result<(), AppError> = async {
        while let Some(field) = multipart.next_field().await? {
            if let Some(file_name) = field.file_name().map(str::to_string) {
                let content_type = field.content_type().map(str::to_string);
                let reader = StreamReader::new(field.map_err(std::io::Error::other));
                pipeline
                    .ingest_part(&file_name, content_type.as_deref(), reader)
                    .await?;
            } else if field.name() == Some(LANG_FIELD) {
                lang_values.push(read_text_field(field).await?);
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = ingested {
        pipeline.abort();
        if !matches!(e, AppError::RequestTimeout(_)) {
            // Consume the rest of the body so the client gets the status instead of a reset
            tracing::warn!("OCR request failed early: {}. Consuming remaining stream...", e);
            let consume = async {
                while let Ok(Some(mut field)) = multipart.next_field().await {
                    while let Ok(Some(_)) = field.chunk().await {}
                }
            };
            if timeout(state.config.read_timeout, consume).await.is_err() {
                tracing::warn!("Gave up consuming the rest of an aborted OCR request");
            }
        }
        return Err(e);
    }

    let languages = LanguageSelection::from_fields(&lang_values);
    let results = pipeline.finish();
    tracing::info!(
        "🧾 OCR request: {} parts, {} staged, lang={}",
        results.len(),
        results.staged_count(),
        languages
    );

    let records = convert_batch(state.extractor.as_ref(), results, &languages).await;
    Ok(Json(records))
}

async fn read_text_field(mut field: Field<'_>) -> Result<String, AppError> {
    let mut value = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        let room = MAX_LANG_FIELD_LEN.saturating_sub(value.len());
        value.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    Ok(String::from_utf8_lossy(&value).into_owned())
}
