//! Body decoding and binary payload detection for text fetches.

use encoding_rs::Encoding;

use crate::core::SchedulerError;

/// Bytes inspected when sniffing for binary content.
const SNIFF_LEN: usize = 8 * 1024;

/// Result of decoding a response body.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Decoded text, or a lossy UTF-8 rendering of the raw bytes on failure.
    pub text: String,
    /// Set when decoding failed and the fallback was used.
    pub error: Option<SchedulerError>,
}

/// Resolve an encoding label (`"utf-8"`, `"gbk"`, `"latin1"`, ...).
#[must_use]
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Decode `raw` with the encoding named by `label`.
///
/// `None` means raw mode: the bytes are rendered as lossy UTF-8 without complaint.
/// Unknown labels and malformed input produce an [`SchedulerError::Encoding`] in
/// [`Decoded::error`] and fall back to the lossy rendering.
#[must_use]
pub fn decode(raw: &[u8], label: Option<&str>) -> Decoded {
    let lossy = || String::from_utf8_lossy(raw).into_owned();
    let Some(label) = label else {
        return Decoded {
            text: lossy(),
            error: None,
        };
    };
    let Some(encoding) = lookup(label) else {
        return Decoded {
            text: lossy(),
            error: Some(SchedulerError::Encoding(format!("unknown encoding `{label}`"))),
        };
    };
    match encoding.decode_without_bom_handling_and_without_replacement(raw) {
        Some(text) => Decoded {
            text: text.into_owned(),
            error: None,
        },
        None => Decoded {
            text: lossy(),
            error: Some(SchedulerError::Encoding(format!(
                "body is not valid {}",
                encoding.name()
            ))),
        },
    }
}

/// Whether a payload looks binary given its `Content-Type` and leading bytes.
///
/// Declared `image/*`, `audio/*`, `video/*`, `font/*` and common archive or
/// document types are binary. Otherwise a NUL byte in the first 8 KiB marks it as binary.
#[must_use]
pub fn is_binary(content_type: Option<&str>, raw: &[u8]) -> bool {
    if let Some(ct) = content_type {
        let mime = ct
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let top = mime.split('/').next().unwrap_or_default();
        if matches!(top, "image" | "audio" | "video" | "font") {
            return true;
        }
        if matches!(
            mime.as_str(),
            "application/octet-stream"
                | "application/zip"
                | "application/gzip"
                | "application/pdf"
                | "application/x-tar"
                | "application/wasm"
        ) {
            return true;
        }
    }
    raw.iter().take(SNIFF_LEN).any(|b| *b == 0)
}
