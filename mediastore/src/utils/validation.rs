use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::domain::file::{FileId, MediaKind};
use crate::error::AppError;

pub const AUDIO_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/wav",
    "audio/ogg",
    "audio/mp4",
    "audio/x-m4a",
];
pub const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg", ".m4a"];
pub const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];

static FILE_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)[0-9a-f]{8}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{12}$").unwrap()
});

fn allow_list(kind: MediaKind) -> (&'static [&'static str], &'static [&'static str]) {
    match kind {
        MediaKind::Audio => (AUDIO_TYPES, AUDIO_EXTENSIONS),
        MediaKind::Image => (IMAGE_TYPES, IMAGE_EXTENSIONS),
    }
}

/// Lowercased extension of `name` including the leading dot, e.g. `.mp3`.
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

/// Both the declared MIME type and the file name extension must be on the
/// kind's allow-list.
pub fn check_media(
    kind: MediaKind,
    content_type: Option<&str>,
    file_name: Option<&str>,
) -> Result<(), AppError> {
    let (types, extensions) = allow_list(kind);
    let type_ok = content_type
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or(ct)
                .trim()
                .to_ascii_lowercase()
        })
        .is_some_and(|ct| types.contains(&ct.as_str()));
    let ext_ok = file_name
        .and_then(file_extension)
        .is_some_and(|ext| extensions.contains(&ext.as_str()));

    if type_ok && ext_ok {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid {kind} file. Supported formats: {}",
            extensions.join(", ")
        )))
    }
}

pub fn is_valid_file_id(raw: &str) -> bool {
    FILE_ID_PATTERN.is_match(raw)
}

pub fn parse_file_id(raw: &str) -> Result<FileId, AppError> {
    let invalid = || AppError::Validation("Invalid file ID".to_string());
    if !is_valid_file_id(raw) {
        return Err(invalid());
    }
    Uuid::parse_str(raw).map_err(|_| invalid())
}
