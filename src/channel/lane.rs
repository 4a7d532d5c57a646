//! Unbounded streaming data lanes.

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use super::types::{Chunk, LaneItem};
use crate::error::{DfsError, Result};

/// Creates one lane belonging to the service named `owner`.
pub fn lane(owner: &str) -> (LaneSender, LaneReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        LaneSender {
            owner: owner.to_string(),
            tx,
        },
        LaneReceiver {
            owner: owner.to_string(),
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

#[derive(Clone)]
pub struct LaneSender {
    owner: String,
    tx: mpsc::UnboundedSender<LaneItem>,
}

impl LaneSender {
    pub fn push(&self, item: LaneItem) -> Result<()> {
        self.tx
            .send(item)
            .map_err(|_| DfsError::Unreachable(self.owner.clone()))
    }

    pub fn push_chunk(&self, seq: u64, data: Vec<u8>) -> Result<()> {
        self.push(Ok(Chunk::new(seq, data)))
    }

    /// Terminates the stream successfully.
    pub fn finish(&self, seq: u64) -> Result<()> {
        self.push(Ok(Chunk::end(seq)))
    }

    /// Terminates the stream as failed.
    pub fn fault(&self, error: DfsError) -> Result<()> {
        self.push(Err(error))
    }
}

/// Receiving half of a lane. Clones share the same queue.
#[derive(Clone)]
pub struct LaneReceiver {
    owner: String,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<LaneItem>>>,
}

impl LaneReceiver {
    /// Waits for the next item. A lane whose senders are gone reads as unreachable.
    pub async fn pull(&self) -> LaneItem {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(item) => item,
            None => Err(DfsError::Unreachable(self.owner.clone())),
        }
    }

    /// Discards whatever is queued right now without waiting for more.
    ///
    /// Only safe while no command is producing into the lane.
    pub async fn clear(&self) -> usize {
        let mut rx = self.rx.lock().await;
        let mut discarded = 0;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    /// Discards items up to and including the stream terminator.
    ///
    /// Returns the number of data chunks thrown away.
    pub async fn drain(&self) -> usize {
        let mut discarded = 0;
        loop {
            match self.pull().await {
                Ok(chunk) if chunk.is_end() => return discarded,
                Ok(_) => discarded += 1,
                Err(_) => return discarded,
            }
        }
    }
}
