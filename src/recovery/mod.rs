//! Recovery Module
//!
//! Operator-invoked tools. Nothing here runs on its own.
//!
//! ## Core Concepts
//! - **Recover**: clone a healthy data service's whole storage root onto a degraded
//!   one, then have the degraded service merge the copied chunk index. This is a
//!   coarse whole-replica copy, not per-file repair.
//! - **Integrity**: compare each complete file's chunk names and SHA-256 hashes
//!   across its replicas and report every disagreement.

pub mod integrity;
pub mod recover;
