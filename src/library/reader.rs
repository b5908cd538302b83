//! Directory reading behind a trait so listings can be built from any source.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use tracing::warn;

/// Raw metadata of one directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Blocking directory access. Called from the blocking thread pool.
pub trait DirReader: Send + Sync {
    /// Entries of the directory at `path`, in no particular order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntryInfo>>;

    /// Metadata of a single file or directory.
    fn stat(&self, path: &Path) -> io::Result<DirEntryInfo>;
}

/// [`DirReader`] over the local filesystem. Symlinks are followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirReader;

impl DirReader for FsDirReader {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            match std::fs::metadata(entry.path()) {
                Ok(metadata) => entries.push(from_metadata(name, &metadata)),
                // Broken symlinks and races with deletion
                Err(err) => warn!("Skipping {}: {}", entry.path().display(), err),
            }
        }
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> io::Result<DirEntryInfo> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(from_metadata(name, &metadata))
    }
}

fn from_metadata(name: String, metadata: &std::fs::Metadata) -> DirEntryInfo {
    DirEntryInfo {
        name,
        is_dir: metadata.is_dir(),
        size: if metadata.is_dir() { 0 } else { metadata.len() },
        modified: metadata.modified().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_dir_and_stat() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp3"), [0u8; 42]).unwrap();
        std::fs::create_dir(dir.path().join("albums")).unwrap();

        let mut entries = FsDirReader.read_dir(dir.path()).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.mp3");
        assert_eq!(entries[0].size, 42);
        assert!(!entries[0].is_dir);
        assert!(entries[1].is_dir);
        assert!(entries[0].modified.is_some());

        let stat = FsDirReader.stat(&dir.path().join("a.mp3")).unwrap();
        assert_eq!(stat, entries[0]);
    }

    #[test]
    fn test_missing_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsDirReader.read_dir(&dir.path().join("gone")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
