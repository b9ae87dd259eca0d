//! `Range` header parsing for resumable downloads.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

static RANGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^bytes=(\d+)-(\d*)$").unwrap());

/// An inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered, both ends included.
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` response header.
    pub fn content_range(&self, file_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, file_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// Not of the form `bytes=START-END` or `bytes=START-`.
    #[error("Malformed Range header: {0}")]
    Malformed(String),

    #[error("Requested range not satisfiable for a {size} byte file")]
    Unsatisfiable { size: u64 },
}

impl RangeError {
    /// `Content-Range` value to send with a 416, when one applies.
    pub fn content_range(&self) -> Option<String> {
        match self {
            RangeError::Malformed(_) => None,
            RangeError::Unsatisfiable { size } => Some(format!("bytes */{}", size)),
        }
    }
}

/// Parses a single-range `Range` header against a file of `file_size` bytes.
///
/// An omitted end means "to the end of the file". The result always satisfies
/// `start <= end < file_size`.
pub fn parse_range(header: &str, file_size: u64) -> Result<ByteRange, RangeError> {
    let caps = RANGE_RE
        .captures(header.trim())
        .ok_or_else(|| RangeError::Malformed(header.to_string()))?;
    let unsatisfiable = RangeError::Unsatisfiable { size: file_size };

    // Digits too large for u64 cannot be inside any file.
    let start: u64 = caps[1].parse().map_err(|_| unsatisfiable.clone())?;
    let end: u64 = match &caps[2] {
        "" => file_size.checked_sub(1).ok_or_else(|| unsatisfiable.clone())?,
        digits => digits.parse().map_err(|_| unsatisfiable.clone())?,
    };

    if start > end || end >= file_size {
        return Err(unsatisfiable);
    }

    Ok(ByteRange { start, end })
}
