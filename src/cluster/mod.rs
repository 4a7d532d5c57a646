//! Cluster Module
//!
//! Boots a whole file store inside one process: the data services, their beacons,
//! the liveness monitor and the name service, wired together through local handles.
//!
//! ## Core Concepts
//! - **Layout**: data service `i` keeps its chunks under `<root>/dataserver<i>`, the
//!   name service its snapshot under `<root>/nameserver`. Starting again on the same
//!   root picks up where the previous run stopped.
//! - **Beacons**: each data service gets a beacon that reports to the monitor for as
//!   long as the service runs. Tests pause a beacon to simulate a silent node.

pub mod client;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::DfsConfig;
use crate::dataservice::endpoint::{DataEndpoint, Fleet};
use crate::dataservice::service::{DataService, DataServiceHandle};
use crate::dataservice::types::{DataCommand, ServiceId};
use crate::error::{DfsError, Result};
use crate::liveness::beacon::{Beacon, BeaconTarget};
use crate::liveness::monitor::LivenessMonitor;
use crate::nameservice::service::{NameService, NameServiceHandle};
use client::DfsClient;

pub struct Cluster {
    config: DfsConfig,
    data: Vec<(DataServiceHandle, Option<JoinHandle<()>>)>,
    beacons: Vec<(ServiceId, Beacon)>,
    monitor: Arc<LivenessMonitor>,
    poller: JoinHandle<()>,
    names: NameServiceHandle,
    name_task: JoinHandle<()>,
    client: Arc<DfsClient>,
}

impl Cluster {
    /// Starts every service described by `config`.
    pub fn start(config: DfsConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.root)?;
        tracing::info!(
            "Starting cluster at {:?}: {} data services, {}x replication, {} byte chunks",
            config.root,
            config.data_services,
            config.replication_factor,
            config.chunk_size
        );

        let monitor = LivenessMonitor::new(config.heartbeat_timeout());
        let mut data = Vec::with_capacity(config.data_services);
        let mut beacons = Vec::with_capacity(config.data_services);
        let mut members: Vec<Arc<dyn DataEndpoint>> = Vec::with_capacity(config.data_services);

        for i in 0..config.data_services {
            let id = ServiceId(format!("dataserver{}", i));
            let (handle, task) = DataService::spawn(id.clone(), &config.data_root(i))?;
            monitor.register(id.clone());

            let probe = handle.clone();
            let beacon = Beacon::spawn(
                id.clone(),
                BeaconTarget::Local(monitor.clone()),
                config.heartbeat_interval(),
                move || probe.is_running(),
            );

            members.push(Arc::new(handle.clone()));
            beacons.push((id, beacon));
            data.push((handle, Some(task)));
        }

        let poller = monitor.clone().start(config.monitor_interval());
        let fleet = Fleet::new(members);
        let (names, name_task) = NameService::spawn(
            &config.name_root(),
            fleet.clone(),
            monitor.clone(),
            config.replication_factor,
        )?;
        let client = Arc::new(DfsClient::new(
            names.clone(),
            fleet,
            monitor.clone(),
            config.chunk_size,
        ));

        Ok(Self {
            config,
            data,
            beacons,
            monitor,
            poller,
            names,
            name_task,
            client,
        })
    }

    pub fn config(&self) -> &DfsConfig {
        &self.config
    }

    pub fn client(&self) -> Arc<DfsClient> {
        self.client.clone()
    }

    pub fn monitor(&self) -> &Arc<LivenessMonitor> {
        &self.monitor
    }

    pub fn name_service(&self) -> &NameServiceHandle {
        &self.names
    }

    pub fn data_service(&self, id: &ServiceId) -> Option<&DataServiceHandle> {
        self.data
            .iter()
            .map(|(handle, _)| handle)
            .find(|handle| handle.id() == id)
    }

    pub fn data_services(&self) -> impl Iterator<Item = &DataServiceHandle> {
        self.data.iter().map(|(handle, _)| handle)
    }

    pub fn beacon(&self, id: &ServiceId) -> Option<&Beacon> {
        self.beacons
            .iter()
            .find(|(beacon_id, _)| beacon_id == id)
            .map(|(_, beacon)| beacon)
    }

    /// Shuts one data service down and waits for its task to exit.
    pub async fn stop_data_service(&mut self, id: &ServiceId) -> Result<()> {
        let Some((handle, task)) = self.data.iter_mut().find(|(h, _)| h.id() == id) else {
            return Err(DfsError::NotFound(format!("data service {}", id)));
        };
        handle.call(DataCommand::Shutdown).await?;
        if let Some(task) = task.take()
            && let Err(e) = task.await
        {
            tracing::warn!("Data service {} task ended abnormally: {}", id, e);
        }
        tracing::info!("Data service {} stopped", id);
        Ok(())
    }

    /// Persists all state and stops every task.
    pub async fn shutdown(self) -> Result<()> {
        self.client.shutdown().await?;

        for (_, beacon) in &self.beacons {
            beacon.stop();
        }
        self.poller.abort();

        if let Err(e) = self.name_task.await {
            tracing::warn!("Name service task ended abnormally: {}", e);
        }
        for (handle, task) in self.data {
            if let Some(task) = task
                && let Err(e) = task.await
            {
                tracing::warn!("Data service {} task ended abnormally: {}", handle.id(), e);
            }
        }

        tracing::info!("Cluster stopped");
        Ok(())
    }
}
