//! Transport-agnostic access to data services.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::service::DataServiceHandle;
use super::types::{DataCommand, DataReply, ServiceId};
use crate::channel::mailbox::Ticket;
use crate::channel::types::LaneItem;
use crate::error::{DfsError, Result};

/// The three operations every data service exposes: submit a command, push a chunk
/// into its inbound lane, pull a chunk from its outbound lane.
#[async_trait]
pub trait DataEndpoint: Send + Sync {
    fn id(&self) -> &ServiceId;

    /// Local storage root, if this process can reach it on disk.
    fn storage_root(&self) -> Option<PathBuf>;

    async fn submit(&self, command: DataCommand) -> Result<Ticket<DataReply>>;

    async fn push(&self, item: LaneItem) -> Result<()>;

    async fn pull(&self) -> LaneItem;

    /// Discards leftovers on the outbound lane. Call only with no command in flight.
    async fn clear_outbound(&self) -> Result<usize>;

    async fn call(&self, command: DataCommand) -> Result<DataReply> {
        self.submit(command).await?.wait().await
    }
}

#[async_trait]
impl DataEndpoint for DataServiceHandle {
    fn id(&self) -> &ServiceId {
        DataServiceHandle::id(self)
    }

    fn storage_root(&self) -> Option<PathBuf> {
        Some(self.root().to_path_buf())
    }

    async fn submit(&self, command: DataCommand) -> Result<Ticket<DataReply>> {
        DataServiceHandle::submit(self, command).await
    }

    async fn push(&self, item: LaneItem) -> Result<()> {
        DataServiceHandle::push(self, item)
    }

    async fn pull(&self) -> LaneItem {
        DataServiceHandle::pull(self).await
    }

    async fn clear_outbound(&self) -> Result<usize> {
        Ok(DataServiceHandle::clear_outbound(self).await)
    }
}

/// The data services known to the name service, in registration order.
#[derive(Clone, Default)]
pub struct Fleet {
    members: Vec<Arc<dyn DataEndpoint>>,
}

impl Fleet {
    pub fn new(members: Vec<Arc<dyn DataEndpoint>>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> Vec<ServiceId> {
        self.members.iter().map(|m| m.id().clone()).collect()
    }

    pub fn get(&self, id: &ServiceId) -> Result<&Arc<dyn DataEndpoint>> {
        self.members
            .iter()
            .find(|m| m.id() == id)
            .ok_or_else(|| DfsError::NotFound(format!("data service {}", id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn DataEndpoint>> {
        self.members.iter()
    }
}
