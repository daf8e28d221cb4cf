use crate::layout;
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("key derivation failed for token '{token}': {source}")]
    KeyDerivation { token: String, source: io::Error },

    #[error("no segment exists for key {key:#010x}")]
    NotFound { key: i32 },

    #[error("attach failed: {0}")]
    AttachFailed(io::Error),

    #[error("segment size mismatch: found {actual} bytes, need at least {expected}")]
    SizeMismatch { actual: usize, expected: usize },

    #[error("short read: got {actual} of {expected} bytes")]
    TruncatedRead { actual: usize, expected: usize },

    #[error("detection count {0} outside 0..={max}", max = layout::MAX_DETECTIONS)]
    CorruptCount(i32),

    #[error("timed out after {0:?} waiting for the detector")]
    Timeout(Duration),
}
