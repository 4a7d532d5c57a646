use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub String);

impl From<&str> for ServiceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where one chunk of a file lives inside a data service's storage root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkLocation {
    pub seq: u64,
    /// File name relative to the storage root.
    pub name: String,
    pub len: u64,
}

/// Content hash of one stored chunk. `sha256` is `None` when the chunk file is missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkDigest {
    pub name: String,
    pub sha256: Option<String>,
}

/// Per-file chunk digests of a whole store, keyed by file path.
pub type StoreDigest = BTreeMap<String, Vec<ChunkDigest>>;

/// Commands accepted by a data service's mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataCommand {
    /// Consume the inbound lane until its terminator and commit the chunks under `path`.
    Store { path: String, op_id: String },
    /// Stream every chunk of `path` to the outbound lane.
    Output { path: String },
    /// Stream bytes `[offset, offset + length)` of `path` to the outbound lane.
    ReadRange {
        path: String,
        offset: u64,
        length: u64,
    },
    Delete { path: String },
    /// Persist the chunk index now.
    Flush,
    /// Merge the on-disk index snapshot into the live index.
    Reload,
    Digest,
    Shutdown,
}

impl DataCommand {
    pub fn name(&self) -> &'static str {
        match self {
            DataCommand::Store { .. } => "store",
            DataCommand::Output { .. } => "output",
            DataCommand::ReadRange { .. } => "read_range",
            DataCommand::Delete { .. } => "delete",
            DataCommand::Flush => "flush",
            DataCommand::Reload => "reload",
            DataCommand::Digest => "digest",
            DataCommand::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DataReply {
    Stored { chunks: u64, bytes: u64 },
    Streamed { chunks: u64, bytes: u64 },
    Deleted { existed: bool },
    Flushed { files: Vec<String> },
    Reloaded { files: usize },
    Digest { files: StoreDigest },
    Stopped,
}
