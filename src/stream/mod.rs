//! Stream Module
//!
//! HTTP range streaming of media files: `Range` parsing, Content-Type
//! lookup, the buffered file body and per-stream counters.

mod body;
mod handler;
pub mod media_type;
mod range;
mod stats;

pub use handler::{apply_cors_headers, apply_stream_headers, MediaStreamer};
pub use media_type::MediaKind;
pub use range::{ByteRange, RangeSpec};
pub use stats::{StreamGuard, StreamStats, StreamStatsSnapshot};
