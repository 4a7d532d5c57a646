//! Chunk Store
//!
//! Chunk files live flat in the storage root, named `<escaped path>-part<seq>`. The
//! index maps each file path to its chunk locations sorted by sequence number.
//!
//! The store never writes stream terminators itself: on success `output`/`read_range`
//! end with the sentinel, and on failure the caller pushes the fault item.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::types::{ChunkDigest, ChunkLocation, ServiceId, StoreDigest};
use crate::channel::lane::{LaneReceiver, LaneSender};
use crate::error::{DfsError, Result};

pub const INDEX_FILE: &str = "chunk_index.bin";

pub type ChunkIndex = BTreeMap<String, Vec<ChunkLocation>>;

/// Escapes `%` and `/` so a file path becomes a single flat file name.
pub fn escape_path(path: &str) -> String {
    path.replace('%', "%25").replace('/', "%2F")
}

pub fn chunk_name(path: &str, seq: u64) -> String {
    format!("{}-part{}", escape_path(path), seq)
}

pub struct ChunkStore {
    id: ServiceId,
    root: PathBuf,
    index: ChunkIndex,
}

impl ChunkStore {
    /// Opens the store rooted at `root`, loading the index snapshot if one exists.
    pub fn open(id: ServiceId, root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let index = read_snapshot(&root.join(INDEX_FILE))?.unwrap_or_default();
        if !index.is_empty() {
            tracing::info!("{}: loaded chunk index with {} files", id, index.len());
        }

        Ok(Self {
            id,
            root: root.to_path_buf(),
            index,
        })
    }

    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry(&self, path: &str) -> Result<&Vec<ChunkLocation>> {
        self.index
            .get(path)
            .ok_or_else(|| DfsError::NotFound(format!("{} holds no '{}'", self.id, path)))
    }

    /// Length of `path` implied by the index.
    pub fn stored_len(&self, path: &str) -> Result<u64> {
        Ok(self.entry(path)?.iter().map(|loc| loc.len).sum())
    }

    /// Consumes `inbound` up to its terminator and commits the chunks under `path`.
    ///
    /// A previous version of `path` is discarded first. If the stream faults or a
    /// write fails, every chunk written by this call is removed and nothing is indexed.
    pub async fn store(&mut self, path: &str, inbound: &LaneReceiver) -> Result<(u64, u64)> {
        if self.index.contains_key(path) {
            self.delete(path).await?;
        }

        let mut written: Vec<ChunkLocation> = Vec::new();
        let mut failure: Option<DfsError> = None;

        loop {
            match inbound.pull().await {
                Ok(chunk) if chunk.is_end() => break,
                Ok(chunk) => {
                    if failure.is_some() {
                        continue;
                    }
                    let name = chunk_name(path, chunk.seq);
                    match tokio::fs::write(self.root.join(&name), &chunk.data).await {
                        Ok(()) => written.push(ChunkLocation {
                            seq: chunk.seq,
                            name,
                            len: chunk.len() as u64,
                        }),
                        Err(e) => {
                            tracing::error!("{}: failed to write {}: {}", self.id, name, e);
                            failure = Some(e.into());
                        }
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // Arrival order may differ from sequence order.
        written.sort_by_key(|loc| loc.seq);

        if failure.is_none()
            && let Some((pos, loc)) = written
                .iter()
                .enumerate()
                .find(|(pos, loc)| loc.seq != *pos as u64)
        {
            failure = Some(DfsError::CorruptIndex(format!(
                "'{}' expected chunk {} but got {}",
                path, pos, loc.seq
            )));
        }

        if let Some(e) = failure {
            self.remove_chunks(&written).await;
            return Err(e);
        }

        let chunks = written.len() as u64;
        let bytes = written.iter().map(|loc| loc.len).sum();
        self.index.insert(path.to_string(), written);

        Ok((chunks, bytes))
    }

    async fn read_chunk(&self, loc: &ChunkLocation) -> Result<Vec<u8>> {
        match tokio::fs::read(self.root.join(&loc.name)).await {
            Ok(data) if data.len() as u64 == loc.len => Ok(data),
            Ok(data) => Err(DfsError::CorruptIndex(format!(
                "{} has {} bytes, index says {}",
                loc.name,
                data.len(),
                loc.len
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DfsError::CorruptIndex(
                format!("chunk file {} is missing", loc.name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Streams every chunk of `path` in sequence order, then the sentinel.
    pub async fn output(&self, path: &str, outbound: &LaneSender) -> Result<(u64, u64)> {
        let entry = self.entry(path)?;
        let mut bytes = 0u64;

        for loc in entry {
            let data = self.read_chunk(loc).await?;
            bytes += data.len() as u64;
            outbound.push_chunk(loc.seq, data)?;
        }
        outbound.finish(entry.len() as u64)?;

        Ok((entry.len() as u64, bytes))
    }

    /// Streams bytes `[offset, offset + length)` of `path`, trimming the first and last
    /// chunks to the window, then the sentinel.
    pub async fn read_range(
        &self,
        path: &str,
        offset: u64,
        length: u64,
        outbound: &LaneSender,
    ) -> Result<(u64, u64)> {
        let entry = self.entry(path)?;
        let size: u64 = entry.iter().map(|loc| loc.len).sum();
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= size)
            .ok_or(DfsError::OutOfRange {
                offset,
                length,
                size,
            })?;

        if length == 0 {
            outbound.finish(0)?;
            return Ok((0, 0));
        }

        let mut sent = 0u64;
        let mut chunk_start = 0u64;
        for loc in entry {
            let chunk_end = chunk_start + loc.len;
            if chunk_start >= end {
                break;
            }
            if chunk_end > offset {
                let data = self.read_chunk(loc).await?;
                let lo = offset.saturating_sub(chunk_start) as usize;
                let hi = (end.min(chunk_end) - chunk_start) as usize;
                // An empty slice would read as the sentinel.
                if lo < hi {
                    outbound.push_chunk(sent, data[lo..hi].to_vec())?;
                    sent += 1;
                }
            }
            chunk_start = chunk_end;
        }
        outbound.finish(sent)?;

        Ok((sent, length))
    }

    /// Drops `path` from the index and removes its chunk files.
    pub async fn delete(&mut self, path: &str) -> Result<bool> {
        match self.index.remove(path) {
            Some(locations) => {
                self.remove_chunks(&locations).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_chunks(&self, locations: &[ChunkLocation]) {
        for loc in locations {
            if let Err(e) = tokio::fs::remove_file(self.root.join(&loc.name)).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!("{}: failed to remove {}: {}", self.id, loc.name, e);
            }
        }
    }

    /// Persists the whole index, replacing the previous snapshot atomically.
    pub fn flush(&self) -> Result<Vec<String>> {
        let bytes = bincode::serialize(&self.index)?;
        let snapshot = self.root.join(INDEX_FILE);
        let tmp = snapshot.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &snapshot)?;

        tracing::debug!("{}: flushed index ({} files)", self.id, self.index.len());
        Ok(self.index.keys().cloned().collect())
    }

    /// Merges the snapshot on disk into the live index; snapshot entries win.
    pub fn reload(&mut self) -> Result<usize> {
        let snapshot = read_snapshot(&self.root.join(INDEX_FILE))?.unwrap_or_default();
        let merged = snapshot.len();
        self.index.extend(snapshot);
        Ok(merged)
    }

    /// SHA-256 of every indexed chunk, grouped by file path.
    pub async fn digest(&self) -> Result<StoreDigest> {
        let mut out = StoreDigest::new();
        for (path, locations) in &self.index {
            let mut digests = Vec::with_capacity(locations.len());
            for loc in locations {
                let sha256 = match tokio::fs::read(self.root.join(&loc.name)).await {
                    Ok(data) => Some(format!("{:x}", Sha256::digest(&data))),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                    Err(e) => return Err(e.into()),
                };
                digests.push(ChunkDigest {
                    name: loc.name.clone(),
                    sha256,
                });
            }
            out.insert(path.clone(), digests);
        }
        Ok(out)
    }
}

fn read_snapshot(snapshot: &Path) -> Result<Option<ChunkIndex>> {
    if !snapshot.is_file() {
        return Ok(None);
    }
    let bytes = std::fs::read(snapshot)?;
    let mut index: ChunkIndex = bincode::deserialize(&bytes)?;
    for locations in index.values_mut() {
        locations.sort_by_key(|loc| loc.seq);
    }
    Ok(Some(index))
}
