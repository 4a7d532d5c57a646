use serde::{Deserialize, Serialize};

use crate::dataservice::types::ServiceId;
use crate::namespace::tree::{FileRecord, Listing};

/// Commands accepted by the name service's mailbox.
#[derive(Debug, Clone)]
pub enum NameCommand {
    Mkdir {
        path: String,
    },
    Deldir {
        path: String,
    },
    List {
        path: String,
    },
    Exists {
        path: String,
    },
    Stat {
        path: String,
    },
    /// Register `dir/name` and replicate the stream arriving on the inbound lane.
    Upload {
        dir: String,
        name: String,
    },
    /// Stream the whole file to the outbound lane.
    Download {
        path: String,
    },
    /// Stream bytes `[offset, offset + length)` to the outbound lane.
    Read {
        path: String,
        offset: u64,
        length: u64,
    },
    /// Every file record with its full path.
    Records,
    /// Record `service` as an extra replica of each of `paths` that exists.
    AdoptReplica {
        service: ServiceId,
        paths: Vec<String>,
    },
    Shutdown,
}

impl NameCommand {
    pub fn name(&self) -> &'static str {
        match self {
            NameCommand::Mkdir { .. } => "mkdir",
            NameCommand::Deldir { .. } => "deldir",
            NameCommand::List { .. } => "list",
            NameCommand::Exists { .. } => "exists",
            NameCommand::Stat { .. } => "stat",
            NameCommand::Upload { .. } => "upload",
            NameCommand::Download { .. } => "download",
            NameCommand::Read { .. } => "read",
            NameCommand::Records => "records",
            NameCommand::AdoptReplica { .. } => "adopt_replica",
            NameCommand::Shutdown => "shutdown",
        }
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub path: String,
    pub size: u64,
    pub chunks: u64,
    pub replicas: Vec<ServiceId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NameReply {
    Done,
    Removed { files: usize },
    Listing(Listing),
    Exists(bool),
    Record(FileRecord),
    Uploaded(UploadSummary),
    /// A read finished; `replica` served the last byte.
    Streamed { bytes: u64, replica: ServiceId },
    Records(Vec<(String, FileRecord)>),
    Adopted { files: usize },
    Stopped,
}
