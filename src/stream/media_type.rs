//! Extension-based media classification and Content-Type lookup.

use std::path::Path;

use serde::Serialize;

/// Content-Type sent for anything not in the table.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Coarse media family of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    File,
}

impl MediaKind {
    pub fn is_media(self) -> bool {
        self != MediaKind::File
    }
}

// (extension, content type, kind); extensions are lowercase without the dot
const MEDIA_TYPES: &[(&str, &str, MediaKind)] = &[
    ("mp4", "video/mp4", MediaKind::Video),
    ("mkv", "video/x-matroska", MediaKind::Video),
    ("avi", "video/x-msvideo", MediaKind::Video),
    ("mov", "video/quicktime", MediaKind::Video),
    ("wmv", "video/x-ms-wmv", MediaKind::Video),
    ("flv", "video/x-flv", MediaKind::Video),
    ("webm", "video/webm", MediaKind::Video),
    ("m4v", "video/x-m4v", MediaKind::Video),
    ("3gp", "video/3gpp", MediaKind::Video),
    ("ts", "video/mp2t", MediaKind::Video),
    ("mts", "video/mp2t", MediaKind::Video),
    ("m2ts", "video/mp2t", MediaKind::Video),
    ("mp3", "audio/mpeg", MediaKind::Audio),
    ("wav", "audio/wav", MediaKind::Audio),
    ("aac", "audio/aac", MediaKind::Audio),
    ("ogg", "audio/ogg", MediaKind::Audio),
    ("flac", "audio/flac", MediaKind::Audio),
    ("m4a", "audio/mp4", MediaKind::Audio),
    ("wma", "audio/x-ms-wma", MediaKind::Audio),
    ("opus", "audio/opus", MediaKind::Audio),
    ("aiff", "audio/aiff", MediaKind::Audio),
    ("jpg", "image/jpeg", MediaKind::Image),
    ("jpeg", "image/jpeg", MediaKind::Image),
    ("png", "image/png", MediaKind::Image),
    ("gif", "image/gif", MediaKind::Image),
    ("bmp", "image/bmp", MediaKind::Image),
    ("webp", "image/webp", MediaKind::Image),
    ("svg", "image/svg+xml", MediaKind::Image),
    ("tiff", "image/tiff", MediaKind::Image),
    ("ico", "image/x-icon", MediaKind::Image),
];

/// Lowercased extension of `path`, empty when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn lookup(extension: &str) -> Option<&'static (&'static str, &'static str, MediaKind)> {
    MEDIA_TYPES
        .iter()
        .find(|(ext, _, _)| ext.eq_ignore_ascii_case(extension))
}

pub fn content_type_for(path: &Path) -> &'static str {
    lookup(&extension_of(path))
        .map(|(_, content_type, _)| *content_type)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

pub fn media_kind(extension: &str) -> MediaKind {
    lookup(extension)
        .map(|(_, _, kind)| *kind)
        .unwrap_or(MediaKind::File)
}
