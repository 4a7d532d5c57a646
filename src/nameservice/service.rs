//! Name Service Actor
//!
//! Owns the `Namespace` and a `Coordinator`. Commands are served strictly one at a
//! time: an upload or read holds the loop until its stream is terminated.

use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::coordinator::Coordinator;
use super::types::{NameCommand, NameReply};
use crate::channel::lane::{LaneReceiver, LaneSender, lane};
use crate::channel::mailbox::{Mailbox, MailboxReceiver, Ticket, mailbox};
use crate::channel::types::LaneItem;
use crate::dataservice::endpoint::Fleet;
use crate::error::Result;
use crate::liveness::monitor::LivenessMonitor;
use crate::namespace::tree::Namespace;

pub const NAME_SERVICE_ID: &str = "nameserver";

/// Command slot plus the two client-facing lanes of the name service.
#[derive(Clone)]
pub struct NameServiceHandle {
    mailbox: Mailbox<NameCommand, NameReply>,
    inbound: LaneSender,
    outbound: LaneReceiver,
}

impl NameServiceHandle {
    pub async fn submit(&self, command: NameCommand) -> Result<Ticket<NameReply>> {
        self.mailbox.submit(command).await
    }

    pub async fn call(&self, command: NameCommand) -> Result<NameReply> {
        self.mailbox.call(command).await
    }

    /// Feeds one upload chunk (or terminator) to the service.
    pub fn push(&self, item: LaneItem) -> Result<()> {
        self.inbound.push(item)
    }

    /// Takes the next item of a download or range read.
    pub async fn pull(&self) -> LaneItem {
        self.outbound.pull().await
    }

    /// Throws away the rest of the current read stream.
    pub async fn discard(&self) -> usize {
        self.outbound.drain().await
    }

    pub fn is_running(&self) -> bool {
        !self.mailbox.is_closed()
    }
}

pub struct NameService {
    namespace: Namespace,
    coordinator: Coordinator,
    commands: MailboxReceiver<NameCommand, NameReply>,
    inbound: LaneReceiver,
    outbound: LaneSender,
    running: bool,
}

impl NameService {
    /// Loads the namespace snapshot under `root` and starts the command loop.
    pub fn spawn(
        root: &Path,
        fleet: Fleet,
        monitor: Arc<LivenessMonitor>,
        replication: usize,
    ) -> Result<(NameServiceHandle, JoinHandle<()>)> {
        let namespace = Namespace::open(root)?;
        let (mailbox, commands) = mailbox(NAME_SERVICE_ID);
        let (inbound_tx, inbound_rx) = lane(NAME_SERVICE_ID);
        let (outbound_tx, outbound_rx) = lane(NAME_SERVICE_ID);

        let handle = NameServiceHandle {
            mailbox,
            inbound: inbound_tx,
            outbound: outbound_rx,
        };

        let service = NameService {
            namespace,
            coordinator: Coordinator::new(fleet, monitor, replication),
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
        tracing::info!(
            "Name service ready with {} data services",
            self.coordinator.fleet().len()
        );

        while self.running {
            let Some(envelope) = self.commands.recv().await else {
                tracing::debug!("Name service mailbox closed");
                if let Err(e) = self.namespace.save() {
                    tracing::error!("Failed to persist namespace: {}", e);
                }
                break;
            };

            let (command, reply) = envelope.into_parts();
            let name = command.name();
            let result = self.execute(command).await;

            match &result {
                Ok(_) => tracing::debug!("Name service: {} done", name),
                Err(e) => tracing::warn!("Name service: {} failed: {}", name, e),
            }

            let _ = reply.send(result);
        }

        tracing::info!("Name service stopped");
    }

    async fn execute(&mut self, command: NameCommand) -> Result<NameReply> {
        match command {
            NameCommand::Mkdir { path } => {
                self.namespace.mkdir(&path)?;
                Ok(NameReply::Done)
            }

            NameCommand::Deldir { path } => {
                let removed = self.namespace.deldir(&path)?;
                for (file, record) in &removed {
                    self.coordinator.purge(file, &record.replicas).await;
                }
                tracing::info!("Removed '{}' ({} files)", path, removed.len());
                Ok(NameReply::Removed {
                    files: removed.len(),
                })
            }

            NameCommand::List { path } => Ok(NameReply::Listing(self.namespace.list(&path)?)),

            NameCommand::Exists { path } => Ok(NameReply::Exists(self.namespace.exists(&path)?)),

            NameCommand::Stat { path } => Ok(NameReply::Record(self.namespace.file(&path)?.clone())),

            NameCommand::Upload { dir, name } => {
                let summary = self
                    .coordinator
                    .upload(&mut self.namespace, &dir, &name, &self.inbound)
                    .await?;
                Ok(NameReply::Uploaded(summary))
            }

            NameCommand::Download { path } => {
                let result = self
                    .coordinator
                    .relay(&self.namespace, &path, None, &self.outbound)
                    .await;
                self.terminate_on_error(result)
            }

            NameCommand::Read {
                path,
                offset,
                length,
            } => {
                let result = self
                    .coordinator
                    .relay(&self.namespace, &path, Some((offset, length)), &self.outbound)
                    .await;
                self.terminate_on_error(result)
            }

            NameCommand::Records => Ok(NameReply::Records(self.namespace.records())),

            NameCommand::AdoptReplica { service, paths } => {
                let mut files = 0;
                for path in &paths {
                    match self.namespace.adopt_replica(path, &service) {
                        Ok(true) => files += 1,
                        Ok(false) => {}
                        Err(e) => tracing::debug!("Skipping replica of '{}': {}", path, e),
                    }
                }
                tracing::info!("{} now listed as replica of {} more files", service, files);
                Ok(NameReply::Adopted { files })
            }

            NameCommand::Shutdown => {
                self.running = false;
                self.namespace.save()?;
                Ok(NameReply::Stopped)
            }
        }
    }

    fn terminate_on_error(&self, result: Result<NameReply>) -> Result<NameReply> {
        if let Err(e) = &result {
            let _ = self.outbound.fault(e.clone());
        }
        result
    }
}
