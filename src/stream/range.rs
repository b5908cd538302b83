//! `Range` header parsing and validation.
//!
//! Only a single `bytes=<start>-<end>` range is served. Either bound may be
//! omitted: a missing start means 0, a missing end means the last byte.
//! When a header lists several ranges, the first one wins.

use crate::error::ServerError;

/// Range as written in the request, before the file size is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// Inclusive byte span inside a file of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl RangeSpec {
    /// Parses a `Range` header value.
    ///
    /// Anything other than `bytes=` followed by exactly one `-` with
    /// optional decimal bounds is [`ServerError::MalformedRange`].
    pub fn parse(header: &str) -> Result<Self, ServerError> {
        let header = header.trim();
        let ranges = header
            .strip_prefix("bytes=")
            .ok_or_else(|| malformed(format!("Range header must start with 'bytes=', got: {}", header)))?;

        let first = ranges.split(',').next().unwrap_or_default().trim();
        let mut parts = first.split('-');
        let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed(format!(
                "Invalid range format, expected 'start-end', got: {}",
                first
            )));
        };

        Ok(Self {
            start: parse_bound(start, "start")?,
            end: parse_bound(end, "end")?,
        })
    }

    /// Applies defaults and checks the range against `size`.
    ///
    /// Fails with [`ServerError::UnsatisfiableRange`] when the end is past
    /// the last byte, the start is after the end, or the file is empty.
    pub fn resolve(self, size: u64) -> Result<ByteRange, ServerError> {
        if size == 0 {
            return Err(ServerError::UnsatisfiableRange { size });
        }

        let start = self.start.unwrap_or(0);
        let end = self.end.unwrap_or(size - 1);
        if end >= size || start > end {
            return Err(ServerError::UnsatisfiableRange { size });
        }

        Ok(ByteRange { start, end })
    }
}

impl ByteRange {
    /// Number of bytes in the span.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Never true for a range built by [`RangeSpec::resolve`].
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// `Content-Range` value for a 206 response.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

fn parse_bound(raw: &str, which: &str) -> Result<Option<u64>, ServerError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u64>()
        .map(Some)
        .map_err(|e| malformed(format!("Invalid {} value '{}': {}", which, raw, e)))
}

fn malformed(message: String) -> ServerError {
    ServerError::MalformedRange(message)
}
