//! Response body that copies a byte span of an open file through a pooled
//! buffer.
//!
//! The copy is driven by the client: each chunk is read only when the
//! connection asks for more, and dropping the body (client gone) stops the
//! copy and returns the buffer to the pool.

use std::io;
use std::path::PathBuf;

use axum::body::Body;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, error};

use crate::buffer::PooledBuffer;
use crate::stream::stats::StreamGuard;

struct CopyState {
    file: File,
    buf: PooledBuffer,
    remaining: u64,
    written: u64,
    guard: StreamGuard,
    path: PathBuf,
}

/// Streams the next `len` bytes of `file` from its current position.
pub fn file_body(
    file: File,
    len: u64,
    buf: PooledBuffer,
    guard: StreamGuard,
    path: PathBuf,
) -> Body {
    let state = CopyState {
        file,
        buf,
        remaining: len,
        written: 0,
        guard,
        path,
    };

    let chunks = futures::stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        if state.remaining == 0 {
            state.guard.complete();
            return None;
        }

        let want = state.remaining.min(state.buf.len() as u64) as usize;
        let read = {
            let CopyState { file, buf, .. } = &mut state;
            file.read(&mut buf[..want]).await
        };

        match read {
            Ok(0) => {
                error!(
                    "File {} ended early after {} bytes ({} still expected)",
                    state.path.display(),
                    state.written,
                    state.remaining
                );
                state.guard.fail();
                Some((Err(io::Error::from(io::ErrorKind::UnexpectedEof)), None))
            }
            Ok(n) => {
                let chunk = Bytes::copy_from_slice(&state.buf[..n]);
                state.remaining -= n as u64;
                state.written += n as u64;
                state.guard.add_bytes(n as u64);
                if state.remaining == 0 {
                    debug!(
                        "Finished streaming {} bytes of {}",
                        state.written,
                        state.path.display()
                    );
                    state.guard.complete();
                }
                Some((Ok(chunk), Some(state)))
            }
            Err(err) => {
                error!(
                    "Read failed for {} after {} bytes: {}",
                    state.path.display(),
                    state.written,
                    err
                );
                state.guard.fail();
                Some((Err(err), None))
            }
        }
    });

    Body::from_stream(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::stream::stats::StreamStats;
    use axum::body::to_bytes;
    use std::io::{Seek, SeekFrom, Write};

    #[tokio::test]
    async fn test_copies_exact_span_in_small_chunks() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        tmp.write_all(&data).unwrap();

        let mut std_file = tmp.reopen().unwrap();
        std_file.seek(SeekFrom::Start(100)).unwrap();
        let file = File::from_std(std_file);

        let buffers = BufferPool::new(64);
        let stats = StreamStats::new();
        let body = file_body(
            file,
            300,
            buffers.acquire(),
            stats.start(),
            tmp.path().to_path_buf(),
        );

        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], &data[100..400]);

        let snap = stats.snapshot();
        assert_eq!(snap.bytes_streamed, 300);
        assert_eq!(snap.completed_streams, 1);
        assert_eq!(snap.active_streams, 0);
        assert_eq!(buffers.stats().in_use, 0, "buffer should be back in the pool");
    }

    #[tokio::test]
    async fn test_short_file_fails_the_body() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"only ten!!").unwrap();
        let file = File::open(tmp.path()).await.unwrap();

        let buffers = BufferPool::new(64);
        let stats = StreamStats::new();
        let body = file_body(
            file,
            20,
            buffers.acquire(),
            stats.start(),
            tmp.path().to_path_buf(),
        );

        assert!(to_bytes(body, usize::MAX).await.is_err());
        assert_eq!(stats.snapshot().failed_streams, 1);
    }

    #[tokio::test]
    async fn test_dropped_body_counts_as_aborted() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 128]).unwrap();
        let file = File::open(tmp.path()).await.unwrap();

        let buffers = BufferPool::new(64);
        let stats = StreamStats::new();
        let body = file_body(
            file,
            128,
            buffers.acquire(),
            stats.start(),
            tmp.path().to_path_buf(),
        );
        drop(body);

        assert_eq!(stats.snapshot().aborted_streams, 1);
        assert_eq!(buffers.stats().idle, 1);
    }
}
