use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;

pub const FALLBACK_IMAGE_MIME: &str = "image/png";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("uploaded file is empty")]
    Empty,
    #[error("failed to read uploaded file: {0}")]
    Unreadable(String),
}

/// An uploaded image in the two shapes the app needs: a base64 payload for
/// Gemini `inlineData` and a `data:` URI for the preview `<img>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub payload: String,
    pub preview_uri: String,
    pub media_type: String,
    pub byte_len: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub media_type: String,
    pub byte_len: usize,
}

impl EncodedImage {
    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            media_type: self.media_type.clone(),
            byte_len: self.byte_len,
        }
    }
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn normalize_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => lowered,
    }
}

fn resolve_media_type(bytes: &[u8], declared: Option<&str>) -> String {
    let declared = declared
        .map(normalize_mime_type)
        .filter(|value| !value.is_empty() && value != "application/octet-stream");
    if let Some(declared) = declared {
        return declared;
    }

    detect_mime_type(bytes)
        .map(|value| normalize_mime_type(&value))
        .unwrap_or_else(|| FALLBACK_IMAGE_MIME.to_string())
}

/// Encodes raw upload bytes. Any non-empty input is accepted as-is; the
/// declared type wins over sniffing unless it is missing or generic.
pub fn load_image(
    bytes: &[u8],
    declared_media_type: Option<&str>,
) -> Result<EncodedImage, IntakeError> {
    if bytes.is_empty() {
        return Err(IntakeError::Empty);
    }

    let media_type = resolve_media_type(bytes, declared_media_type);
    let payload = general_purpose::STANDARD.encode(bytes);
    let preview_uri = format!("data:{};base64,{}", media_type, payload);

    Ok(EncodedImage {
        payload,
        preview_uri,
        media_type,
        byte_len: bytes.len(),
    })
}
