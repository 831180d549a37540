use base64::{Engine, engine::general_purpose};

/// A recipe image decoded from a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Canonical file extension (`jpeg` payloads are stored as `jpg`).
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImageDecodeError {
    #[error("Expected a data URL of the form data:image/<type>;base64,<payload>")]
    NotDataUrl,

    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("Image payload is not valid base64")]
    InvalidBase64,

    #[error("Image payload is empty")]
    Empty,

    #[error("Image is larger than {max} bytes")]
    TooLarge { max: usize },

    #[error("Upload a valid image. The file is either not an image or corrupted")]
    NotAnImage,
}

/// Decodes `data:image/<ext>;base64,<payload>` into raw bytes.
///
/// The payload must decode to at most `max_bytes` bytes and start with the
/// signature of the declared format.
pub fn decode_data_url(data: &str, max_bytes: usize) -> Result<DecodedImage, ImageDecodeError> {
    let rest = data
        .trim()
        .strip_prefix("data:image/")
        .ok_or(ImageDecodeError::NotDataUrl)?;
    let (media_type, payload) = rest
        .split_once(";base64,")
        .ok_or(ImageDecodeError::NotDataUrl)?;

    let extension = match media_type.to_ascii_lowercase().as_str() {
        "png" => "png",
        "jpg" | "jpeg" => "jpg",
        "gif" => "gif",
        "webp" => "webp",
        other => return Err(ImageDecodeError::UnsupportedType(other.to_owned())),
    };

    if payload.is_empty() {
        return Err(ImageDecodeError::Empty);
    }
    // Reject before decoding; base64 expands by 4/3.
    if payload.len() / 4 * 3 > max_bytes + 3 {
        return Err(ImageDecodeError::TooLarge { max: max_bytes });
    }

    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| ImageDecodeError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(ImageDecodeError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(ImageDecodeError::TooLarge { max: max_bytes });
    }
    if !has_signature(extension, &bytes) {
        return Err(ImageDecodeError::NotAnImage);
    }

    Ok(DecodedImage { extension, bytes })
}

fn has_signature(extension: &str, bytes: &[u8]) -> bool {
    match extension {
        "png" => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
        "jpg" => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        "gif" => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        "webp" => bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
        _ => false,
    }
}

/// Content type served for a stored media key.
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
