//! Cached directory listings and file records.
//!
//! Listings of large directories are built in batches on the worker pool.
//! A batch the pool turns away is built on the calling task instead.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::SharedCache;
use crate::error::{Result, ServerError};
use crate::library::file_info::{child_path, listing_order, CachedValue, FileInfo};
use crate::library::reader::{DirEntryInfo, DirReader};
use crate::library::resolver::{clean_relative, PathResolver};
use crate::pool::WorkerPool;

/// Directories with more entries than this are split into pool batches.
pub const PARALLEL_THRESHOLD: usize = 10;
pub const BATCH_SIZE: usize = 10;

pub type MetadataCache = SharedCache<CachedValue>;

pub fn listing_key(path: &str) -> String {
    format!("dirlist:{}", path)
}

pub fn file_info_key(path: &str) -> String {
    format!("fileinfo:{}", path)
}

/// Directory listing and file-info service over a media root.
pub struct MediaLibrary {
    resolver: Arc<dyn PathResolver>,
    reader: Arc<dyn DirReader>,
    cache: MetadataCache,
    pool: Option<Arc<WorkerPool>>,
    listing_ttl: Duration,
}

impl MediaLibrary {
    pub fn new(
        resolver: Arc<dyn PathResolver>,
        reader: Arc<dyn DirReader>,
        cache: MetadataCache,
        pool: Option<Arc<WorkerPool>>,
        listing_ttl: Duration,
    ) -> Self {
        Self {
            resolver,
            reader,
            cache,
            pool,
            listing_ttl,
        }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    // == Listing ==
    /// Lists a directory, directories first and then by name.
    pub async fn list_directory(&self, request_path: &str) -> Result<Arc<[FileInfo]>> {
        let rel = clean_relative(request_path);
        let key = listing_key(&rel);

        let cached = self.cache.write().await.get(&key);
        if let Some(CachedValue::Listing(listing)) = cached {
            debug!("Listing cache hit for '{}'", rel);
            return Ok(listing);
        }

        let resolver = Arc::clone(&self.resolver);
        let reader = Arc::clone(&self.reader);
        let shown = rel.clone();
        let entries = run_blocking(move || {
            let full = resolver.resolve(&shown)?;
            let dir = reader.stat(&full).map_err(|e| io_error(e, &shown))?;
            if !dir.is_dir {
                return Err(ServerError::NotFound(format!("Not a directory: {}", shown)));
            }
            reader.read_dir(&full).map_err(|e| io_error(e, &shown))
        })
        .await?;

        let mut files = match &self.pool {
            Some(pool) if entries.len() > PARALLEL_THRESHOLD => {
                build_in_batches(pool, entries, &rel).await
            }
            _ => build_files(&entries, &rel),
        };
        files.sort_by(listing_order);

        let listing: Arc<[FileInfo]> = files.into();
        self.cache.write().await.set_with_ttl(
            key,
            CachedValue::Listing(Arc::clone(&listing)),
            self.listing_ttl,
        );
        debug!("Listed '{}' ({} entries)", rel, listing.len());
        Ok(listing)
    }

    // == File Info ==
    /// Metadata of a single file or directory.
    pub async fn file_info(&self, request_path: &str) -> Result<Arc<FileInfo>> {
        let rel = clean_relative(request_path);
        let key = file_info_key(&rel);

        let cached = self.cache.write().await.get(&key);
        if let Some(CachedValue::File(info)) = cached {
            return Ok(info);
        }

        let resolver = Arc::clone(&self.resolver);
        let reader = Arc::clone(&self.reader);
        let shown = rel.clone();
        let entry = run_blocking(move || {
            let full = resolver.resolve(&shown)?;
            reader.stat(&full).map_err(|e| io_error(e, &shown))
        })
        .await?;

        let info = Arc::new(FileInfo::from_entry(&entry, rel));
        self.cache
            .write()
            .await
            .set(key, CachedValue::File(Arc::clone(&info)));
        Ok(info)
    }

    /// Drops the cached listing and file record of `request_path`. Returns
    /// how many entries were removed.
    pub async fn invalidate(&self, request_path: &str) -> usize {
        let rel = clean_relative(request_path);
        let mut cache = self.cache.write().await;
        [listing_key(&rel), file_info_key(&rel)]
            .iter()
            .filter(|key| cache.invalidate(key))
            .count()
    }
}

fn build_files(entries: &[DirEntryInfo], parent: &str) -> Vec<FileInfo> {
    entries
        .iter()
        .map(|entry| FileInfo::from_entry(entry, child_path(parent, &entry.name)))
        .collect()
}

async fn build_in_batches(
    pool: &Arc<WorkerPool>,
    entries: Vec<DirEntryInfo>,
    parent: &str,
) -> Vec<FileInfo> {
    let batches: Vec<Arc<[DirEntryInfo]>> = entries
        .chunks(BATCH_SIZE)
        .map(Arc::from)
        .collect();
    let cancel = CancellationToken::new();

    let jobs = batches
        .into_iter()
        .enumerate()
        .map(|(index, batch)| run_batch(pool, &cancel, index * BATCH_SIZE, batch, parent));

    join_all(jobs).await.into_iter().flatten().collect()
}

async fn run_batch(
    pool: &WorkerPool,
    cancel: &CancellationToken,
    offset: usize,
    batch: Arc<[DirEntryInfo]>,
    parent: &str,
) -> Vec<FileInfo> {
    // Written by the worker; left empty if the task never ran
    let slot: Arc<Mutex<Option<Vec<FileInfo>>>> = Arc::new(Mutex::new(None));

    let job = {
        let slot = Arc::clone(&slot);
        let batch = Arc::clone(&batch);
        let parent = parent.to_string();
        move || -> anyhow::Result<()> {
            let files = build_files(&batch, &parent);
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(files);
            Ok(())
        }
    };

    if let Err(err) = pool
        .submit_and_wait(format!("file-batch-{}", offset), cancel, job)
        .await
    {
        debug!("Building batch at {} locally: {}", offset, err);
    }

    let built = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    built.unwrap_or_else(|| build_files(&batch, parent))
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ServerError::Io(io::Error::other(err)))?
}

fn io_error(err: io::Error, rel: &str) -> ServerError {
    if err.kind() == io::ErrorKind::NotFound {
        ServerError::NotFound(format!("Path not found: {}", rel))
    } else {
        ServerError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::library::{FsDirReader, MediaRoot};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(60);

    /// Counts directory reads so cache hits are observable.
    struct CountingReader {
        reads: AtomicUsize,
    }

    impl DirReader for CountingReader {
        fn read_dir(&self, path: &std::path::Path) -> io::Result<Vec<DirEntryInfo>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            FsDirReader.read_dir(path)
        }

        fn stat(&self, path: &std::path::Path) -> io::Result<DirEntryInfo> {
            FsDirReader.stat(path)
        }
    }

    fn library(
        root: &std::path::Path,
        pool: Option<Arc<WorkerPool>>,
    ) -> (MediaLibrary, Arc<CountingReader>) {
        let reader = Arc::new(CountingReader {
            reads: AtomicUsize::new(0),
        });
        let cache = CacheStore::new(100, 1024 * 1024, TTL).into_shared();
        let library = MediaLibrary::new(
            Arc::new(MediaRoot::new(root).unwrap()),
            reader.clone(),
            cache,
            pool,
            Duration::from_secs(120),
        );
        (library, reader)
    }

    fn populate(root: &std::path::Path, files: usize, dirs: usize) {
        for i in 0..files {
            std::fs::write(root.join(format!("track{:02}.mp3", i)), [0u8; 8]).unwrap();
        }
        for i in 0..dirs {
            std::fs::create_dir(root.join(format!("album{:02}", i))).unwrap();
        }
    }

    #[tokio::test]
    async fn test_small_listing_is_sorted_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), 3, 2);
        let (library, reader) = library(dir.path(), None);

        let listing = library.list_directory("/").await.unwrap();
        let names: Vec<_> = listing.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["album00", "album01", "track00.mp3", "track01.mp3", "track02.mp3"]);
        assert_eq!(listing[2].path, "track00.mp3");

        library.list_directory("").await.unwrap();
        assert_eq!(reader.reads.load(Ordering::SeqCst), 1);
        assert_eq!(library.cache().read().await.stats().hits, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_large_listing_uses_pool() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), 30, 5);
        let pool = WorkerPool::new("file-operations", 2, 100);
        let (library, _) = library(dir.path(), Some(Arc::clone(&pool)));

        let listing = library.list_directory("").await.unwrap();

        assert_eq!(listing.len(), 35);
        assert!(listing[..5].iter().all(|f| f.is_dir));
        assert!(listing.windows(2).all(|w| listing_order(&w[0], &w[1]).is_le()));
        assert_eq!(pool.metrics().total_tasks, 4);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejected_batches_built_locally() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), 25, 0);
        let pool = WorkerPool::new("file-operations", 1, 1);
        pool.shutdown().await;
        let (library, _) = library(dir.path(), Some(pool));

        let listing = library.list_directory("").await.unwrap();
        assert_eq!(listing.len(), 25);
    }

    #[tokio::test]
    async fn test_file_info_and_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("movies")).unwrap();
        std::fs::write(dir.path().join("movies/film.mkv"), [0u8; 2048]).unwrap();
        let (library, _) = library(dir.path(), None);

        let info = library.file_info("movies/film.mkv").await.unwrap();
        assert_eq!(info.name, "film.mkv");
        assert_eq!(info.path, "movies/film.mkv");
        assert_eq!(info.size, 2048);
        assert!(info.is_media);

        library.list_directory("movies").await.unwrap();
        assert_eq!(library.invalidate("/movies/film.mkv").await, 1);
        assert_eq!(library.invalidate("movies/").await, 1);
        assert_eq!(library.invalidate("movies").await, 0);
    }

    #[tokio::test]
    async fn test_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("song.mp3"), b"x").unwrap();
        let (library, _) = library(dir.path(), None);

        assert!(matches!(
            library.list_directory("song.mp3").await,
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(
            library.list_directory("nope").await,
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(
            library.file_info("../outside").await,
            Err(ServerError::NotFound(_))
        ));
    }

    /// Waits for a signal sent by another task on the same runtime thread.
    struct GatedResolver {
        root: MediaRoot,
        gate: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl PathResolver for GatedResolver {
        fn resolve(&self, request_path: &str) -> Result<std::path::PathBuf> {
            let gate = self.gate.lock().unwrap();
            gate.recv_timeout(Duration::from_secs(2))
                .map_err(|_| ServerError::NotFound("resolver blocked the runtime".to_string()))?;
            self.root.resolve(request_path)
        }
    }

    #[tokio::test]
    async fn test_resolve_runs_on_blocking_pool() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), 2, 0);
        let (tx, rx) = std::sync::mpsc::channel();
        let resolver = Arc::new(GatedResolver {
            root: MediaRoot::new(dir.path()).unwrap(),
            gate: Mutex::new(rx),
        });
        let cache = CacheStore::new(100, 1024 * 1024, TTL).into_shared();
        let library = MediaLibrary::new(resolver, Arc::new(FsDirReader), cache, None, TTL);

        tokio::spawn(async move {
            tx.send(()).unwrap();
            tx.send(()).unwrap();
        });

        let listing = library.list_directory("").await.unwrap();
        assert_eq!(listing.len(), 2);
        let info = library.file_info("track01.mp3").await.unwrap();
        assert_eq!(info.size, 8);
    }
}
