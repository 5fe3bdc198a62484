use mime::Mime;
use std::path::Path;

/// Declared content types accepted for recognition.
///
/// This is a filter on the client-supplied `Content-Type` header only. The bytes are never
/// sniffed, so a client can label anything as `application/pdf`; the external toolchain is
/// what ultimately rejects malformed input.
pub const ALLOWED_MIME_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/png", "image/tiff"];

/// Longest extension carried over to a staged file name.
const MAX_EXTENSION_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates the declared MIME type of a part against the allowlist.
///
/// Parameters such as `; charset=binary` are ignored and comparison is case-insensitive.
/// A missing or unparsable header is rejected.
pub fn validate_mime_type(content_type: Option<&str>) -> Result<(), ValidationError> {
    let declared = content_type.unwrap_or_default();

    let accepted = declared
        .trim()
        .parse::<Mime>()
        .map(|mime| {
            ALLOWED_MIME_TYPES
                .iter()
                .any(|allowed| mime.essence_str().eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false);

    if accepted {
        return Ok(());
    }

    Err(ValidationError {
        code: "UNSUPPORTED_FILE_TYPE",
        message: format!("MIME type '{}' is not allowed", declared),
    })
}

/// Returns the lower-cased extension of an untrusted client filename, including the leading
/// dot, or an empty string when there is none.
///
/// Only ASCII alphanumeric extensions survive; anything else would end up inside a path on
/// the shared temp directory.
pub fn normalized_extension(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();

    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_mime_types() {
        assert!(validate_mime_type(Some("application/pdf")).is_ok());
        assert!(validate_mime_type(Some("image/jpeg")).is_ok());
        assert!(validate_mime_type(Some("image/png")).is_ok());
        assert!(validate_mime_type(Some("image/tiff")).is_ok());
    }

    #[test]
    fn test_mime_parameters_and_case_ignored() {
        assert!(validate_mime_type(Some("Application/PDF")).is_ok());
        assert!(validate_mime_type(Some("image/png; charset=binary")).is_ok());
    }

    #[test]
    fn test_rejected_mime_types() {
        for ct in ["text/plain", "image/gif", "application/x-pdf", "image/*", "garbage"] {
            let err = validate_mime_type(Some(ct)).unwrap_err();
            assert_eq!(err.code, "UNSUPPORTED_FILE_TYPE");
        }
        assert!(validate_mime_type(None).is_err());
    }

    #[test]
    fn test_normalized_extension() {
        assert_eq!(normalized_extension("scan.PDF"), ".pdf");
        assert_eq!(normalized_extension("photo.Jpeg"), ".jpeg");
        assert_eq!(normalized_extension("archive.tar.TIFF"), ".tiff");
        assert_eq!(normalized_extension("noext"), "");
        assert_eq!(normalized_extension(".hidden"), "");
        assert_eq!(normalized_extension("../../etc/passwd"), "");
        assert_eq!(normalized_extension("C:\\docs\\page.PNG"), ".png");
        assert_eq!(normalized_extension("evil.p$f"), "");
    }
}
