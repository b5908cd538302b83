//! Library Module
//!
//! Path resolution, directory reading and the cached listing service that
//! sits on top of the metadata cache and the worker pool.

mod file_info;
mod reader;
mod resolver;
mod service;

pub use file_info::{CachedValue, FileInfo};
pub use reader::{DirEntryInfo, DirReader, FsDirReader};
pub use resolver::{clean_relative, MediaRoot, PathResolver};
pub use service::{file_info_key, listing_key, MediaLibrary, MetadataCache, BATCH_SIZE};
