//! Media type guessing for blob uploads and downloads.

use std::path::Path;

pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

// First entry for a media type wins on reverse lookup.
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("json", "application/json"),
    ("txt", "text/plain"),
    ("log", "text/plain"),
    ("csv", "text/csv"),
    ("md", "text/markdown"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("xml", "application/xml"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("xls", "application/vnd.ms-excel"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("doc", "application/msword"),
    ("dss", "application/octet-stream"),
];

/// Guess a media type from the file extension, case-insensitively.
pub fn guess_media_type(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| {
            MEDIA_TYPES
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(ext))
                .map(|(_, media)| *media)
        })
        .unwrap_or(DEFAULT_MEDIA_TYPE)
}

/// File extension (without dot) for a media type. Parameters like `;charset=utf-8` are ignored.
pub fn extension_for_media_type(media_type: &str) -> Option<&'static str> {
    let essence = media_type.split(';').next().unwrap_or("").trim();
    if essence.eq_ignore_ascii_case(DEFAULT_MEDIA_TYPE) {
        return None;
    }
    MEDIA_TYPES
        .iter()
        .find(|(_, media)| media.eq_ignore_ascii_case(essence))
        .map(|(ext, _)| *ext)
}
