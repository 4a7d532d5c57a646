use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A slice of a file's byte stream, numbered from 0 by its producer.
///
/// An empty `data` is the end-of-stream sentinel. It still carries the next
/// sequence number so consumers can tell how many chunks preceded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub seq: u64,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(seq: u64, data: Vec<u8>) -> Self {
        Self { seq, data }
    }

    pub fn end(seq: u64) -> Self {
        Self {
            seq,
            data: Vec::new(),
        }
    }

    pub fn is_end(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// What travels on a data lane: a chunk, or a fault that terminates the stream.
pub type LaneItem = Result<Chunk>;
