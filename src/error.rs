//! Error Types
//!
//! A single error enum shared by every service. It is `Clone` and serializable
//! because errors travel as values: as fault terminators on data lanes and as
//! command replies over the RPC boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DfsError>;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DfsError {
    /// Namespace path, file, or chunk index entry is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Fewer data services than the replication factor at upload time.
    #[error("insufficient replicas: need {required}, have {available}")]
    InsufficientReplicas { required: usize, available: usize },

    /// Range read past the stored length.
    #[error("range {offset}+{length} out of bounds for {size} bytes")]
    OutOfRange { offset: u64, length: u64, size: u64 },

    /// Target service closed its mailbox, dropped a reply, or did not answer.
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// The chunk index references chunk files that are missing or not contiguous.
    #[error("corrupt chunk index: {0}")]
    CorruptIndex(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A name is already taken by the other kind of entry (file vs directory).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The file is registered but its upload has not completed.
    #[error("upload still in progress: {0}")]
    Incomplete(String),

    /// Bytes already reached the caller when every remaining replica failed.
    #[error("partial content for {path}: {delivered} bytes delivered")]
    PartialContent { path: String, delivered: u64 },

    /// A stream was cancelled by its producer.
    #[error("aborted: {0}")]
    Aborted(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("codec error: {0}")]
    Codec(String),
}

impl From<std::io::Error> for DfsError {
    fn from(e: std::io::Error) -> Self {
        DfsError::Io(e.to_string())
    }
}

impl From<bincode::Error> for DfsError {
    fn from(e: bincode::Error) -> Self {
        DfsError::Codec(e.to_string())
    }
}

impl From<serde_json::Error> for DfsError {
    fn from(e: serde_json::Error) -> Self {
        DfsError::Codec(e.to_string())
    }
}
