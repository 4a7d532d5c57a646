//! Data Service Module
//!
//! A chunk-storage node. Each data service is one tokio task that owns a `ChunkStore`
//! and serves commands from its single-slot mailbox, moving chunk payloads through its
//! inbound and outbound data lanes.
//!
//! ## Core Concepts
//! - **Chunk Store**: chunk files on disk plus an index `file path -> ordered chunk
//!   locations`. The index is persisted only on flush/shutdown.
//! - **Commands**: store, output, range read, delete, flush, reload, digest, shutdown.
//! - **Endpoint**: `DataEndpoint` abstracts submit/push/pull so coordinators work the same
//!   against an in-process handle or a remote node behind the RPC boundary.

pub mod endpoint;
pub mod service;
pub mod store;
pub mod types;
