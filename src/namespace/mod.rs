//! Namespace Module
//!
//! The name service's in-memory directory tree. Directories map child names to child
//! nodes; files map names to `FileRecord`s carrying size, chunk count, replica set and
//! upload state.
//!
//! The tree is owned by the name service's command loop and is never shared. It is
//! written as a single bincode snapshot on shutdown and read back on startup.

pub mod tree;

#[cfg(test)]
mod tests;
