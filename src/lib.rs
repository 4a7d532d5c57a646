//! Miniature Distributed File Store Library
//!
//! This library crate defines the core modules that make up the file store.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! A single name service coordinates a fleet of data services that hold chunked,
//! 3-way replicated file content:
//!
//! - **`channel`**: The message plumbing every service is built on. A single-slot
//!   command mailbox with completion tickets, plus unbounded data lanes carrying
//!   chunks and fault terminators.
//! - **`namespace`**: The directory tree and per-file records (size, chunk count,
//!   replica set, upload state), persisted as a snapshot.
//! - **`dataservice`**: The chunk store and its service loop. Stores, streams and
//!   range-reads chunked files; persists a chunk index.
//! - **`nameservice`**: The namespace authority. Places replicas, fans uploads out
//!   with atomic rollback, and relays reads with failover between replicas.
//! - **`liveness`**: Beacons sent by data services and the monitor that flags silent
//!   ones as suspected.
//! - **`recovery`**: Operator tools: whole-replica recovery and integrity audits.
//! - **`cluster`**: In-process boot of a whole fleet plus the caller facade.
//! - **`rpc`**: The HTTP boundary that lets data services run as separate processes.
//! - **`config`** / **`error`**: Shared tunables and the common error type.

pub mod channel;
pub mod cluster;
pub mod config;
pub mod dataservice;
pub mod error;
pub mod liveness;
pub mod namespace;
pub mod nameservice;
pub mod recovery;
pub mod rpc;
