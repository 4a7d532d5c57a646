//! Wire Protocol
//!
//! Endpoints and Data Transfer Objects (DTOs) shared by the data nodes, the name node
//! and their clients.
//!
//! Command traffic is JSON. Lane traffic is bincode: a body is exactly one encoded
//! `LaneItem`, so chunk payloads travel without base64 inflation.

use serde::{Deserialize, Serialize};

use crate::dataservice::types::{DataCommand, DataReply, ServiceId};
use crate::error::DfsError;
use crate::liveness::types::Liveness;

// --- Data node endpoints ---

/// Submits one command and answers once it has completed.
pub const ENDPOINT_SUBMIT: &str = "/internal/submit";
/// Appends one lane item to the service's inbound lane.
pub const ENDPOINT_LANE_IN: &str = "/internal/lane/in";
/// Long-polls the next item of the service's outbound lane.
pub const ENDPOINT_LANE_OUT: &str = "/internal/lane/out";
/// Discards leftovers on the outbound lane; answers with the number dropped.
pub const ENDPOINT_LANE_CLEAR: &str = "/internal/lane/clear";

// --- Name node endpoints ---

/// Liveness report from a data node's beacon.
pub const ENDPOINT_HEARTBEAT: &str = "/internal/heartbeat";

pub const ENDPOINT_MKDIR: &str = "/fs/mkdir";
pub const ENDPOINT_DELDIR: &str = "/fs/deldir";
pub const ENDPOINT_LIST: &str = "/fs/ls";
pub const ENDPOINT_EXISTS: &str = "/fs/exists";
/// Raw request body is the file content.
pub const ENDPOINT_UPLOAD: &str = "/fs/upload";
pub const ENDPOINT_DOWNLOAD: &str = "/fs/download";
pub const ENDPOINT_READ: &str = "/fs/read";
pub const ENDPOINT_INTEGRITY: &str = "/admin/integrity";
/// Rebuilds one data service's store from a healthy peer.
pub const ENDPOINT_RECOVER: &str = "/admin/recover";
pub const ENDPOINT_LIVENESS: &str = "/admin/liveness";

// --- Data Transfer Objects ---

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub command: DataCommand,
}

/// Completion of a submitted command, carrying the service's own error on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub result: Result<DataReply, DfsError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub service_id: ServiceId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecoverRequest {
    pub target: ServiceId,
}

/// Query or body naming one namespace path.
#[derive(Debug, Serialize, Deserialize)]
pub struct PathParams {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadParams {
    pub dir: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadParams {
    pub path: String,
    pub offset: u64,
    pub length: u64,
}

/// Uniform envelope of the client API. Exactly one of `data` and `error` is set.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<DfsError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: DfsError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LivenessEntry {
    pub service_id: ServiceId,
    pub state: Liveness,
    pub silent_for_ms: u64,
}
