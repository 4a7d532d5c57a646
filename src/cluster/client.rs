//! Caller Facade
//!
//! The interface a shell or an HTTP front end drives. Streaming operations take the
//! transfer lock for their whole duration, so two callers never interleave traffic
//! on the name service's lanes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::channel::mailbox::Ticket;
use crate::channel::types::Chunk;
use crate::dataservice::endpoint::Fleet;
use crate::dataservice::types::{DataCommand, ServiceId};
use crate::error::{DfsError, Result};
use crate::liveness::monitor::LivenessMonitor;
use crate::liveness::types::Liveness;
use crate::namespace::tree::{FileRecord, Listing};
use crate::nameservice::service::NameServiceHandle;
use crate::nameservice::types::{NameCommand, NameReply, UploadSummary};
use crate::recovery::integrity::{IntegrityReport, check_integrity};
use crate::recovery::recover::{RecoveryReport, recover};

fn unexpected(reply: NameReply) -> DfsError {
    DfsError::Codec(format!("unexpected name service reply: {:?}", reply))
}

pub struct DfsClient {
    names: NameServiceHandle,
    fleet: Fleet,
    monitor: Arc<LivenessMonitor>,
    chunk_size: usize,
    transfer: Arc<Mutex<()>>,
}

impl DfsClient {
    pub fn new(
        names: NameServiceHandle,
        fleet: Fleet,
        monitor: Arc<LivenessMonitor>,
        chunk_size: usize,
    ) -> Self {
        Self {
            names,
            fleet,
            monitor,
            chunk_size: chunk_size.max(1),
            transfer: Arc::new(Mutex::new(())),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    // ============================================================================
    // Namespace
    // ============================================================================

    pub async fn mkdir(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        match self.names.call(NameCommand::Mkdir { path }).await? {
            NameReply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Removes a directory subtree, returning how many files went with it.
    pub async fn deldir(&self, path: &str) -> Result<usize> {
        let path = path.to_string();
        match self.names.call(NameCommand::Deldir { path }).await? {
            NameReply::Removed { files } => Ok(files),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list(&self, path: &str) -> Result<Listing> {
        let path = path.to_string();
        match self.names.call(NameCommand::List { path }).await? {
            NameReply::Listing(listing) => Ok(listing),
            other => Err(unexpected(other)),
        }
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        match self.names.call(NameCommand::Exists { path }).await? {
            NameReply::Exists(exists) => Ok(exists),
            other => Err(unexpected(other)),
        }
    }

    pub async fn stat(&self, path: &str) -> Result<FileRecord> {
        let path = path.to_string();
        match self.names.call(NameCommand::Stat { path }).await? {
            NameReply::Record(record) => Ok(record),
            other => Err(unexpected(other)),
        }
    }

    pub async fn records(&self) -> Result<Vec<(String, FileRecord)>> {
        match self.names.call(NameCommand::Records).await? {
            NameReply::Records(records) => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    // ============================================================================
    // Upload
    // ============================================================================

    /// Starts uploading `dir/name`. Feed it with `write`, then `finish`.
    pub async fn begin_upload(&self, dir: &str, name: &str) -> Result<UploadSession> {
        let guard = self.transfer.clone().lock_owned().await;
        let ticket = self
            .names
            .submit(NameCommand::Upload {
                dir: dir.to_string(),
                name: name.to_string(),
            })
            .await?;

        Ok(UploadSession {
            names: self.names.clone(),
            ticket: Some(ticket),
            buffer: Vec::with_capacity(self.chunk_size),
            chunk_size: self.chunk_size,
            seq: 0,
            _guard: guard,
        })
    }

    /// Uploads a local file into `dest_dir`, keeping its file name.
    ///
    /// Fails with `NotFound` before contacting the name service if the file is missing.
    pub async fn upload(&self, local: &Path, dest_dir: &str) -> Result<UploadSummary> {
        let name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DfsError::InvalidPath(format!("{:?} has no file name", local)))?
            .to_string();
        let mut file = match tokio::fs::File::open(local).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DfsError::NotFound(format!("local file {:?}", local)));
            }
            Err(e) => return Err(e.into()),
        };

        let mut session = self.begin_upload(dest_dir, &name).await?;
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => session.write(&buf[..n])?,
                Err(e) => return session.abort(e.into()).await,
            }
        }
        session.finish().await
    }

    pub async fn upload_bytes(&self, dir: &str, name: &str, data: &[u8]) -> Result<UploadSummary> {
        let mut session = self.begin_upload(dir, name).await?;
        session.write(data)?;
        session.finish().await
    }

    // ============================================================================
    // Reads
    // ============================================================================

    /// Opens a stream over the whole file.
    pub async fn open(&self, path: &str) -> Result<ReadStream> {
        let path = path.to_string();
        self.open_stream(NameCommand::Download { path }).await
    }

    /// Opens a stream over bytes `[offset, offset + length)`.
    pub async fn open_range(&self, path: &str, offset: u64, length: u64) -> Result<ReadStream> {
        let path = path.to_string();
        self.open_stream(NameCommand::Read {
            path,
            offset,
            length,
        })
        .await
    }

    async fn open_stream(&self, command: NameCommand) -> Result<ReadStream> {
        let guard = self.transfer.clone().lock_owned().await;
        let ticket = self.names.submit(command).await?;
        Ok(ReadStream {
            names: self.names.clone(),
            ticket: Some(ticket),
            guard: Some(guard),
        })
    }

    /// Downloads `path` to `save_dir/<file name>`, returning the written path.
    ///
    /// A failed download leaves no file behind.
    pub async fn download(&self, path: &str, save_dir: &Path) -> Result<PathBuf> {
        let name = path
            .rsplit('/')
            .find(|s| !s.is_empty())
            .ok_or_else(|| DfsError::InvalidPath(format!("'{}' names no file", path)))?;
        let mut stream = self.open(path).await?;

        let dest = save_dir.join(name);
        let written = async {
            tokio::fs::create_dir_all(save_dir).await?;
            let mut file = tokio::fs::File::create(&dest).await?;
            while let Some(data) = stream.next().await {
                file.write_all(&data?).await?;
            }
            file.flush().await?;
            Ok::<(), DfsError>(())
        }
        .await;

        match written {
            Ok(()) => Ok(dest),
            Err(e) => {
                drop(stream);
                let _ = tokio::fs::remove_file(&dest).await;
                Err(e)
            }
        }
    }

    /// The whole file in memory.
    pub async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        self.open(path).await?.collect().await
    }

    pub async fn read_range(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.open_range(path, offset, length).await?.collect().await
    }

    // ============================================================================
    // Administration
    // ============================================================================

    /// Clones another data service's storage onto `target` and records the target as
    /// a replica of every file it received.
    pub async fn recover(&self, target: &ServiceId) -> Result<RecoveryReport> {
        let _guard = self.transfer.lock().await;
        let report = recover(&self.fleet, &self.monitor, target).await?;
        let adopted = self
            .names
            .call(NameCommand::AdoptReplica {
                service: target.clone(),
                paths: report.files.clone(),
            })
            .await?;
        tracing::debug!("Recovery of {} registered: {:?}", target, adopted);
        Ok(report)
    }

    pub async fn check_integrity(&self) -> Result<IntegrityReport> {
        let _guard = self.transfer.lock().await;
        let records = self.records().await?;
        Ok(check_integrity(&records, &self.fleet).await)
    }

    pub fn liveness(&self, id: &ServiceId) -> Option<Liveness> {
        self.monitor.state(id)
    }

    /// Every tracked data service with its state and time since its last report.
    pub fn liveness_snapshot(&self) -> Vec<(ServiceId, Liveness, Duration)> {
        self.monitor.snapshot()
    }

    /// Stops the name service (persisting the namespace), then every data service.
    pub async fn shutdown(&self) -> Result<()> {
        let _guard = self.transfer.lock().await;
        self.names.call(NameCommand::Shutdown).await?;
        for endpoint in self.fleet.iter() {
            if let Err(e) = endpoint.call(DataCommand::Shutdown).await {
                tracing::warn!("Data service {} did not shut down cleanly: {}", endpoint.id(), e);
            }
        }
        Ok(())
    }
}

/// An upload in progress. Buffers writes into chunk-sized pieces.
///
/// Dropping an unfinished session terminates the stream with a fault, which rolls the
/// upload back.
pub struct UploadSession {
    names: NameServiceHandle,
    ticket: Option<Ticket<NameReply>>,
    buffer: Vec<u8>,
    chunk_size: usize,
    seq: u64,
    _guard: OwnedMutexGuard<()>,
}

impl UploadSession {
    pub fn write(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let room = self.chunk_size - self.buffer.len();
            let take = room.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffer.len() == self.chunk_size {
                self.flush_chunk()?;
            }
        }
        Ok(())
    }

    fn flush_chunk(&mut self) -> Result<()> {
        let data = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.chunk_size));
        self.names.push(Ok(Chunk::new(self.seq, data)))?;
        self.seq += 1;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<UploadSummary> {
        if !self.buffer.is_empty() {
            self.flush_chunk()?;
        }
        self.names.push(Ok(Chunk::end(self.seq)))?;
        match self.take_ticket()?.wait().await? {
            NameReply::Uploaded(summary) => Ok(summary),
            other => Err(unexpected(other)),
        }
    }

    /// Cancels the upload, returning `reason` once the name service has rolled back.
    pub async fn abort<T>(mut self, reason: DfsError) -> Result<T> {
        let _ = self.names.push(Err(reason.clone()));
        if let Ok(ticket) = self.take_ticket() {
            let _ = ticket.wait().await;
        }
        Err(reason)
    }

    fn take_ticket(&mut self) -> Result<Ticket<NameReply>> {
        self.ticket
            .take()
            .ok_or_else(|| DfsError::Aborted("upload already terminated".to_string()))
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if self.ticket.is_some() {
            let _ = self
                .names
                .push(Err(DfsError::Aborted("upload abandoned".to_string())));
        }
    }
}

/// The byte stream of a download or range read.
///
/// Dropping it before the end drains the rest in the background so the next reader
/// starts on a clean lane.
pub struct ReadStream {
    names: NameServiceHandle,
    ticket: Option<Ticket<NameReply>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ReadStream {
    /// The next chunk of bytes, or `None` after the stream ended cleanly.
    pub async fn next(&mut self) -> Option<Result<Vec<u8>>> {
        let ticket = self.ticket.take()?;
        match self.names.pull().await {
            Ok(chunk) if chunk.is_end() => match ticket.wait().await {
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            },
            Ok(chunk) => {
                self.ticket = Some(ticket);
                Some(Ok(chunk.data))
            }
            Err(e) => {
                let _ = ticket.wait().await;
                Some(Err(e))
            }
        }
    }

    pub async fn collect(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(data) = self.next().await {
            out.extend_from_slice(&data?);
        }
        Ok(out)
    }

    /// Adapts the stream for use as an HTTP body.
    pub fn into_stream(self) -> impl futures_util::Stream<Item = Result<Vec<u8>>> + Send {
        futures_util::stream::unfold(self, |mut stream| async move {
            stream.next().await.map(|item| (item, stream))
        })
    }
}

impl Drop for ReadStream {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            let names = self.names.clone();
            let guard = self.guard.take();
            tokio::spawn(async move {
                let dropped = names.discard().await;
                let _ = ticket.wait().await;
                tracing::debug!("Discarded {} unread chunks", dropped);
                drop(guard);
            });
        }
    }
}
