//! Upload and Read Coordination
//!
//! The parts of the name service that talk to data services. Neither function holds
//! any state of its own; the namespace is passed in by the owning actor.

use std::sync::Arc;
use uuid::Uuid;

use super::placement;
use super::types::{NameReply, UploadSummary};
use crate::channel::lane::{LaneReceiver, LaneSender};
use crate::channel::mailbox::Ticket;
use crate::dataservice::endpoint::{DataEndpoint, Fleet};
use crate::dataservice::types::{DataCommand, DataReply, ServiceId};
use crate::error::{DfsError, Result};
use crate::liveness::monitor::LivenessMonitor;
use crate::namespace::tree::{FileRecord, Namespace, normalize};

type Target = (Arc<dyn DataEndpoint>, Ticket<DataReply>);

pub struct Coordinator {
    fleet: Fleet,
    monitor: Arc<LivenessMonitor>,
    replication: usize,
}

impl Coordinator {
    pub fn new(fleet: Fleet, monitor: Arc<LivenessMonitor>, replication: usize) -> Self {
        Self {
            fleet,
            monitor,
            replication,
        }
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    // ============================================================================
    // Upload
    // ============================================================================

    /// Registers `dir/name`, replicates the inbound stream and commits the record.
    ///
    /// The inbound lane is always consumed up to its terminator, whatever the outcome.
    pub async fn upload(
        &self,
        ns: &mut Namespace,
        dir: &str,
        name: &str,
        inbound: &LaneReceiver,
    ) -> Result<UploadSummary> {
        let prepared = self.prepare(ns, dir, name);
        let (path, replicas, previous) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                let dropped = inbound.drain().await;
                tracing::warn!(
                    "Rejected upload of '{}' into '{}': {} ({} chunks discarded)",
                    name,
                    dir,
                    e,
                    dropped
                );
                return Err(e);
            }
        };

        let op_id = Uuid::new_v4().to_string();
        tracing::info!(
            "Uploading '{}' to {:?} (op {})",
            path,
            replicas.iter().map(|r| r.0.as_str()).collect::<Vec<_>>(),
            op_id
        );

        match self.replicate(&path, &op_id, &replicas, inbound).await {
            Ok((size, chunks)) => {
                ns.finalize_file(&path, size, chunks)?;

                if let Some(old) = previous {
                    let stale: Vec<ServiceId> = old
                        .replicas
                        .into_iter()
                        .filter(|id| !replicas.contains(id))
                        .collect();
                    self.purge(&path, &stale).await;
                }

                tracing::info!("Upload of '{}' complete: {} bytes, {} chunks", path, size, chunks);
                Ok(UploadSummary {
                    path,
                    size,
                    chunks,
                    replicas,
                })
            }
            Err(e) => {
                tracing::error!("Upload of '{}' failed, rolling back: {}", path, e);
                let _ = ns.remove_file(&path);

                let mut holders = replicas;
                if let Some(old) = previous {
                    for id in old.replicas {
                        if !holders.contains(&id) {
                            holders.push(id);
                        }
                    }
                }
                self.purge(&path, &holders).await;
                Err(e)
            }
        }
    }

    fn prepare(
        &self,
        ns: &mut Namespace,
        dir: &str,
        name: &str,
    ) -> Result<(String, Vec<ServiceId>, Option<FileRecord>)> {
        let path = ns.check_new_file(dir, name)?;
        let replicas =
            placement::choose_replicas(&self.fleet.ids(), self.replication, &mut rand::thread_rng())?;
        let previous = ns.register_file(dir, name, FileRecord::pending(replicas.clone()))?;
        Ok((path, replicas, previous))
    }

    /// Submits `Store` to every replica and copies each inbound chunk to all of them.
    async fn replicate(
        &self,
        path: &str,
        op_id: &str,
        replicas: &[ServiceId],
        inbound: &LaneReceiver,
    ) -> Result<(u64, u64)> {
        let mut targets: Vec<Target> = Vec::with_capacity(replicas.len());
        for id in replicas {
            let submitted = match self.fleet.get(id) {
                Ok(endpoint) => {
                    let command = DataCommand::Store {
                        path: path.to_string(),
                        op_id: op_id.to_string(),
                    };
                    endpoint
                        .submit(command)
                        .await
                        .map(|ticket| (endpoint.clone(), ticket))
                }
                Err(e) => Err(e),
            };

            match submitted {
                Ok(target) => targets.push(target),
                Err(e) => {
                    abort(&targets, format!("replica {} unavailable", id)).await;
                    inbound.drain().await;
                    let _ = settle(targets).await;
                    return Err(e);
                }
            }
        }

        let mut size = 0u64;
        let mut chunks = 0u64;
        let mut failure: Option<DfsError> = None;

        loop {
            match inbound.pull().await {
                Ok(chunk) if chunk.is_end() => {
                    for (endpoint, _) in &targets {
                        if let Err(e) = endpoint.push(Ok(chunk.clone())).await {
                            failure.get_or_insert(e);
                        }
                    }
                    break;
                }
                Ok(chunk) => {
                    size += chunk.len() as u64;
                    chunks += 1;

                    let mut pushed = Ok(());
                    for (endpoint, _) in &targets {
                        pushed = endpoint.push(Ok(chunk.clone())).await;
                        if pushed.is_err() {
                            break;
                        }
                    }
                    if let Err(e) = pushed {
                        tracing::warn!("Replication of '{}' interrupted: {}", path, e);
                        abort(&targets, format!("upload of {} interrupted", path)).await;
                        inbound.drain().await;
                        failure = Some(e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Client stream for '{}' failed: {}", path, e);
                    for (endpoint, _) in &targets {
                        let _ = endpoint.push(Err(e.clone())).await;
                    }
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Err(e) = settle(targets).await {
            failure.get_or_insert(e);
        }

        match failure {
            Some(e) => Err(e),
            None => Ok((size, chunks)),
        }
    }

    /// Best-effort removal of `path` from each of `holders`.
    pub async fn purge(&self, path: &str, holders: &[ServiceId]) {
        for id in holders {
            let Ok(endpoint) = self.fleet.get(id) else {
                continue;
            };
            let command = DataCommand::Delete {
                path: path.to_string(),
            };
            if let Err(e) = endpoint.call(command).await {
                tracing::warn!("Could not delete '{}' from {}: {}", path, id, e);
            }
        }
    }

    // ============================================================================
    // Read
    // ============================================================================

    /// Streams `path` (or the byte range of it) to `outbound`, failing over between
    /// replicas.
    ///
    /// On success the stream is terminated here. On error the caller terminates it.
    pub async fn relay(
        &self,
        ns: &Namespace,
        path: &str,
        range: Option<(u64, u64)>,
        outbound: &LaneSender,
    ) -> Result<NameReply> {
        let path = normalize(path);
        let path = path.as_str();
        let record = ns.file(path)?;
        if !record.is_complete() {
            return Err(DfsError::Incomplete(path.to_string()));
        }

        let (offset, length) = range.unwrap_or((0, record.size));
        if offset
            .checked_add(length)
            .is_none_or(|end| end > record.size)
        {
            return Err(DfsError::OutOfRange {
                offset,
                length,
                size: record.size,
            });
        }

        let candidates = self.monitor.rank(&record.replicas);
        let mut delivered = 0u64;
        let mut seq = 0u64;
        let mut last_error: Option<DfsError> = None;

        for id in candidates {
            let endpoint = match self.fleet.get(&id) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            let command = if range.is_none() && delivered == 0 {
                DataCommand::Output {
                    path: path.to_string(),
                }
            } else {
                DataCommand::ReadRange {
                    path: path.to_string(),
                    offset: offset + delivered,
                    length: length - delivered,
                }
            };

            // Nothing of ours is in flight here, so anything queued is stale.
            match endpoint.clear_outbound().await {
                Ok(0) => {}
                Ok(n) => tracing::warn!("Replica {} had {} stale outbound items", id, n),
                Err(e) => {
                    tracing::warn!("Replica {} of '{}' unavailable: {}", id, path, e);
                    last_error = Some(e);
                    continue;
                }
            }

            let ticket = match endpoint.submit(command).await {
                Ok(ticket) => ticket,
                Err(e) => {
                    tracing::warn!("Replica {} of '{}' unavailable: {}", id, path, e);
                    last_error = Some(e);
                    continue;
                }
            };

            let mut caller_gone = false;
            let mut expected = 0u64;
            let streamed = loop {
                match endpoint.pull().await {
                    Ok(chunk) if chunk.seq != expected => {
                        break Err(DfsError::CorruptIndex(format!(
                            "replica {} sent chunk {} of '{}', expected {}",
                            id, chunk.seq, path, expected
                        )));
                    }
                    Ok(chunk) if chunk.is_end() => break Ok(()),
                    Ok(chunk) => {
                        expected += 1;
                        delivered += chunk.len() as u64;
                        if outbound.push_chunk(seq, chunk.data).is_err() {
                            caller_gone = true;
                        }
                        seq += 1;
                    }
                    Err(e) => break Err(e),
                }
            };
            let result = match streamed {
                Ok(()) => ticket.wait().await.map(|_| ()),
                Err(e) => {
                    // Once the command has finished, whatever it still pushed is dropped.
                    let _ = ticket.wait().await;
                    let _ = endpoint.clear_outbound().await;
                    Err(e)
                }
            };

            if caller_gone {
                return Err(DfsError::Aborted(format!("reader of {} went away", path)));
            }

            match result {
                Ok(()) if delivered == length => {
                    outbound.finish(seq)?;
                    return Ok(NameReply::Streamed {
                        bytes: delivered,
                        replica: id,
                    });
                }
                Ok(()) if delivered > length => {
                    return Err(DfsError::CorruptIndex(format!(
                        "replica {} returned {} bytes of '{}', expected {}",
                        id, delivered, path, length
                    )));
                }
                Ok(()) => {
                    tracing::warn!(
                        "Replica {} ended '{}' early at {} of {} bytes",
                        id,
                        path,
                        delivered,
                        length
                    );
                    last_error = Some(DfsError::CorruptIndex(format!(
                        "replica {} holds a short copy of '{}'",
                        id, path
                    )));
                }
                Err(e) => {
                    tracing::warn!(
                        "Replica {} failed on '{}' after {} bytes, failing over: {}",
                        id,
                        path,
                        delivered,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        if delivered > 0 {
            Err(DfsError::PartialContent {
                path: path.to_string(),
                delivered,
            })
        } else {
            Err(last_error.unwrap_or_else(|| DfsError::Unreachable(format!("replicas of {}", path))))
        }
    }
}

/// Terminates every target's inbound stream with a fault.
async fn abort(targets: &[Target], reason: String) {
    for (endpoint, _) in targets {
        let _ = endpoint.push(Err(DfsError::Aborted(reason.clone()))).await;
    }
}

/// Waits for every target's acknowledgement, returning the first failure.
async fn settle(targets: Vec<Target>) -> Result<()> {
    let mut first_error = None;
    for (endpoint, ticket) in targets {
        if let Err(e) = ticket.wait().await {
            tracing::warn!("Replica {} rejected the upload: {}", endpoint.id(), e);
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
