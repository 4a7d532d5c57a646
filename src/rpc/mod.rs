//! RPC Module
//!
//! Carries the mailbox and lane protocol over HTTP so data services and the name
//! service can run as separate processes.
//!
//! ## Core Concepts
//! - **Data node**: exposes submit, push and pull for one data service. Each endpoint
//!   maps one-to-one onto a `DataServiceHandle` call.
//! - **Remote endpoint**: `RemoteDataService` implements `DataEndpoint` on top of
//!   those three routes, so the name service coordinators cannot tell a remote
//!   service from a local one.
//! - **Name node**: accepts beacons and serves the client API on top of `DfsClient`.
//! - **Retries**: submit and push retry with backoff and jitter when the connection
//!   cannot be established. Pull never retries; a lost response would lose a chunk.

pub mod handlers;
pub mod protocol;
pub mod remote;
