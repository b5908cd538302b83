//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory media is served from
    pub media_dir: PathBuf,
    /// HTTP server port
    pub server_port: u16,
    /// Maximum number of entries the metadata cache can hold
    pub cache_max_entries: usize,
    /// Approximate memory cap of the metadata cache in bytes
    pub cache_max_memory: usize,
    /// Default TTL in seconds for cached records
    pub cache_default_ttl: u64,
    /// TTL in seconds for cached directory listings
    pub listing_ttl: u64,
    /// Cache sweep interval in seconds
    pub sweep_interval: u64,
    /// Number of workers in the file-operations pool
    pub worker_count: usize,
    /// Capacity of the worker pool's task queue
    pub worker_queue_size: usize,
    /// Metrics sampling interval in seconds
    pub metrics_interval: u64,
    /// Upper bound in seconds on waiting for workers and background tasks at shutdown
    pub shutdown_timeout: u64,
    /// Idle buffers kept by the buffer pool after each metrics tick
    pub buffer_pool_max_idle: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEDIA_DIR` - Media root (default: ./media)
    /// - `SERVER_PORT` - HTTP server port (default: 8080)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_MAX_MEMORY` - Cache memory cap in bytes (default: 50 MiB)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 600)
    /// - `CACHE_LISTING_TTL` - Directory listing TTL in seconds (default: 120)
    /// - `CACHE_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 300)
    /// - `WORKER_COUNT` - File-operation workers (default: 2 x CPU count)
    /// - `WORKER_QUEUE_SIZE` - Worker queue capacity (default: 100)
    /// - `METRICS_INTERVAL` - Metrics sampling in seconds (default: 5)
    /// - `SHUTDOWN_TIMEOUT` - Shutdown wait in seconds (default: 30)
    /// - `BUFFER_POOL_MAX_IDLE` - Idle stream buffers retained (default: 64)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            media_dir: env::var("MEDIA_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.media_dir),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_max_memory: env_or("CACHE_MAX_MEMORY", defaults.cache_max_memory),
            cache_default_ttl: env_or("CACHE_DEFAULT_TTL", defaults.cache_default_ttl),
            listing_ttl: env_or("CACHE_LISTING_TTL", defaults.listing_ttl),
            sweep_interval: env_or("CACHE_SWEEP_INTERVAL", defaults.sweep_interval),
            worker_count: env_or("WORKER_COUNT", defaults.worker_count),
            worker_queue_size: env_or("WORKER_QUEUE_SIZE", defaults.worker_queue_size),
            metrics_interval: env_or("METRICS_INTERVAL", defaults.metrics_interval),
            shutdown_timeout: env_or("SHUTDOWN_TIMEOUT", defaults.shutdown_timeout),
            buffer_pool_max_idle: env_or("BUFFER_POOL_MAX_IDLE", defaults.buffer_pool_max_idle),
        }
    }

    /// Creates the media directory if needed and makes `media_dir` absolute.
    pub fn prepare_media_dir(&mut self) -> std::io::Result<()> {
        if !self.media_dir.exists() {
            tracing::info!(
                "Media directory {} does not exist, creating it",
                self.media_dir.display()
            );
            std::fs::create_dir_all(&self.media_dir)?;
        }
        self.media_dir = self.media_dir.canonicalize()?;
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_default_ttl)
    }

    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

/// I/O-bound work benefits from more workers than cores.
fn io_optimal_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("./media"),
            server_port: 8080,
            cache_max_entries: 1000,
            cache_max_memory: 50 * 1024 * 1024,
            cache_default_ttl: 600,
            listing_ttl: 120,
            sweep_interval: 300,
            worker_count: io_optimal_worker_count(),
            worker_queue_size: 100,
            metrics_interval: 5,
            shutdown_timeout: 30,
            buffer_pool_max_idle: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.media_dir, PathBuf::from("./media"));
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.cache_max_entries, 1000);
        assert_eq!(config.cache_max_memory, 50 * 1024 * 1024);
        assert_eq!(config.cache_default_ttl, 600);
        assert_eq!(config.listing_ttl, 120);
        assert_eq!(config.sweep_interval, 300);
        assert!(config.worker_count >= 2);
        assert_eq!(config.worker_queue_size, 100);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("MEDIA_DIR");
        env::remove_var("SERVER_PORT");
        env::remove_var("CACHE_MAX_ENTRIES");
        env::remove_var("CACHE_DEFAULT_TTL");
        env::remove_var("WORKER_QUEUE_SIZE");

        let config = Config::from_env();
        assert_eq!(config.media_dir, PathBuf::from("./media"));
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.cache_max_entries, 1000);
        assert_eq!(config.cache_default_ttl, 600);
        assert_eq!(config.worker_queue_size, 100);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("MEDIA_SERVER_TEST_GARBAGE", "not-a-number");
        let value: u64 = env_or("MEDIA_SERVER_TEST_GARBAGE", 42);
        assert_eq!(value, 42);
        env::remove_var("MEDIA_SERVER_TEST_GARBAGE");
    }

    #[test]
    fn test_prepare_media_dir_creates_and_canonicalizes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config {
            media_dir: tmp.path().join("nested").join("media"),
            ..Config::default()
        };

        config.prepare_media_dir().unwrap();

        assert!(config.media_dir.is_absolute());
        assert!(config.media_dir.is_dir());
    }
}
