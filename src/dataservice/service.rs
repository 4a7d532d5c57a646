//! Data Service Actor
//!
//! One task per data service. The loop takes one command at a time from the mailbox
//! and runs it to completion; failures are logged and returned to the submitter,
//! and the loop keeps serving.

use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

use super::store::ChunkStore;
use super::types::{DataCommand, DataReply, ServiceId};
use crate::channel::lane::{LaneReceiver, LaneSender, lane};
use crate::channel::mailbox::{Mailbox, MailboxReceiver, Ticket, mailbox};
use crate::channel::types::LaneItem;
use crate::error::Result;

/// Everything a caller needs to drive one data service.
#[derive(Clone)]
pub struct DataServiceHandle {
    id: ServiceId,
    root: PathBuf,
    mailbox: Mailbox<DataCommand, DataReply>,
    inbound: LaneSender,
    outbound: LaneReceiver,
}

impl DataServiceHandle {
    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn submit(&self, command: DataCommand) -> Result<Ticket<DataReply>> {
        self.mailbox.submit(command).await
    }

    pub async fn call(&self, command: DataCommand) -> Result<DataReply> {
        self.mailbox.call(command).await
    }

    pub fn push(&self, item: LaneItem) -> Result<()> {
        self.inbound.push(item)
    }

    pub async fn pull(&self) -> LaneItem {
        self.outbound.pull().await
    }

    /// Drops items left on the outbound lane by an abandoned stream.
    pub async fn clear_outbound(&self) -> usize {
        self.outbound.clear().await
    }

    /// False once the command loop has exited.
    pub fn is_running(&self) -> bool {
        !self.mailbox.is_closed()
    }
}

pub struct DataService {
    id: ServiceId,
    store: ChunkStore,
    commands: MailboxReceiver<DataCommand, DataReply>,
    inbound: LaneReceiver,
    outbound: LaneSender,
    running: bool,
}

impl DataService {
    /// Opens the chunk store under `root` and starts the command loop.
    pub fn spawn(id: ServiceId, root: &Path) -> Result<(DataServiceHandle, JoinHandle<()>)> {
        let store = ChunkStore::open(id.clone(), root)?;
        let (mailbox, commands) = mailbox(&id.0);
        let (inbound_tx, inbound_rx) = lane(&id.0);
        let (outbound_tx, outbound_rx) = lane(&id.0);

        let handle = DataServiceHandle {
            id: id.clone(),
            root: root.to_path_buf(),
            mailbox,
            inbound: inbound_tx,
            outbound: outbound_rx,
        };

        let service = DataService {
            id,
            store,
            commands,
            inbound: inbound_rx,
            outbound: outbound_tx,
            running: true,
        };

        let task = tokio::spawn(async move {
            service.run().await;
        });

        Ok((handle, task))
    }

    async fn run(mut self) {
        tracing::info!("Data service {} ready at {:?}", self.id, self.store.root());

        while self.running {
            let Some(envelope) = self.commands.recv().await else {
                tracing::debug!("{}: mailbox closed", self.id);
                break;
            };

            let (command, reply) = envelope.into_parts();
            let name = command.name();
            let result = self.execute(command).await;

            match &result {
                Ok(_) => tracing::debug!("{}: {} done", self.id, name),
                Err(e) => tracing::error!("{}: {} failed: {}", self.id, name, e),
            }

            let _ = reply.send(result);
        }

        tracing::info!("Data service {} stopped", self.id);
    }

    async fn execute(&mut self, command: DataCommand) -> Result<DataReply> {
        match command {
            DataCommand::Store { path, op_id } => {
                tracing::debug!("{}: storing '{}' (op {})", self.id, path, op_id);
                let (chunks, bytes) = self.store.store(&path, &self.inbound).await?;
                tracing::info!(
                    "{}: stored '{}' ({} chunks, {} bytes)",
                    self.id,
                    path,
                    chunks,
                    bytes
                );
                Ok(DataReply::Stored { chunks, bytes })
            }

            DataCommand::Output { path } => {
                let result = self.store.output(&path, &self.outbound).await;
                self.terminate_on_error(result)
            }

            DataCommand::ReadRange {
                path,
                offset,
                length,
            } => {
                let result = self
                    .store
                    .read_range(&path, offset, length, &self.outbound)
                    .await;
                self.terminate_on_error(result)
            }

            DataCommand::Delete { path } => {
                let existed = self.store.delete(&path).await?;
                Ok(DataReply::Deleted { existed })
            }

            DataCommand::Flush => {
                let files = self.store.flush()?;
                Ok(DataReply::Flushed { files })
            }

            DataCommand::Reload => {
                let files = self.store.reload()?;
                tracing::info!("{}: merged {} files from snapshot", self.id, files);
                Ok(DataReply::Reloaded { files })
            }

            DataCommand::Digest => {
                let files = self.store.digest().await?;
                Ok(DataReply::Digest { files })
            }

            DataCommand::Shutdown => {
                self.running = false;
                self.store.flush()?;
                Ok(DataReply::Stopped)
            }
        }
    }

    /// Ends the outbound stream with a fault if the streaming command failed.
    fn terminate_on_error(&self, result: Result<(u64, u64)>) -> Result<DataReply> {
        match result {
            Ok((chunks, bytes)) => Ok(DataReply::Streamed { chunks, bytes }),
            Err(e) => {
                let _ = self.outbound.fault(e.clone());
                Err(e)
            }
        }
    }
}
