//! File metadata records and the cache payload built from them.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::MemSize;
use crate::library::reader::DirEntryInfo;
use crate::stream::media_type::{extension_of, media_kind};
use crate::stream::MediaKind;

/// Extra charge for a file record on top of its string lengths.
const FILE_INFO_OVERHEAD: usize = 64;

/// Metadata of one file or directory under the media root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    /// Path relative to the media root, `/`-separated
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    /// RFC 3339 modification time
    pub modified: Option<String>,
    /// Lowercase, without the dot
    pub extension: String,
    pub is_media: bool,
    pub media_type: MediaKind,
}

impl FileInfo {
    pub fn from_entry(entry: &DirEntryInfo, path: String) -> Self {
        let (extension, media_type) = if entry.is_dir {
            (String::new(), MediaKind::File)
        } else {
            let extension = extension_of(Path::new(&entry.name));
            let kind = media_kind(&extension);
            (extension, kind)
        };

        Self {
            name: entry.name.clone(),
            path,
            is_dir: entry.is_dir,
            size: entry.size,
            modified: entry
                .modified
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
            extension,
            is_media: media_type.is_media(),
            media_type,
        }
    }
}

impl MemSize for FileInfo {
    fn mem_size(&self) -> usize {
        self.name.len()
            + self.path.len()
            + self.extension.len()
            + self.modified.as_ref().map_or(0, String::len)
            + FILE_INFO_OVERHEAD
    }
}

/// Directories first, then by name.
pub fn listing_order(a: &FileInfo, b: &FileInfo) -> Ordering {
    b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name))
}

/// `name` joined onto a cleaned relative directory path.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Value stored in the metadata cache.
#[derive(Debug, Clone)]
pub enum CachedValue {
    File(Arc<FileInfo>),
    Listing(Arc<[FileInfo]>),
}

impl MemSize for CachedValue {
    fn mem_size(&self) -> usize {
        match self {
            CachedValue::File(info) => info.mem_size(),
            CachedValue::Listing(files) => files.mem_size(),
        }
    }
}
