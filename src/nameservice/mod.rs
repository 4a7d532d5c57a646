//! Name Service Module
//!
//! The namespace authority. A single task owns the directory tree and serves namespace
//! queries, uploads and reads one command at a time.
//!
//! ## Core Concepts
//! - **Placement**: each new file gets exactly `replication_factor` distinct data services,
//!   drawn uniformly at random. The choice is recorded in the file's `FileRecord`.
//! - **Upload fan-out**: every incoming chunk is pushed to every selected replica. The
//!   file only becomes `Complete` once all replicas acknowledge; otherwise the namespace
//!   entry is rolled back and the partial copies are purged.
//! - **Read failover**: reads target the recorded replicas, alive ones first. When a
//!   replica fails mid-stream the next one is asked for the remaining byte range only,
//!   so the caller never sees a byte twice.

pub mod coordinator;
pub mod placement;
pub mod service;
pub mod types;
