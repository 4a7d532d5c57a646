use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::monitor::LivenessMonitor;
use crate::dataservice::types::ServiceId;
use crate::rpc::protocol::{ENDPOINT_HEARTBEAT, HeartbeatRequest};

/// Where a beacon delivers its reports.
#[derive(Clone)]
pub enum BeaconTarget {
    Local(Arc<LivenessMonitor>),
    /// Base URL of the name node, e.g. `http://127.0.0.1:7000`.
    Remote {
        base_url: String,
        client: reqwest::Client,
    },
}

impl BeaconTarget {
    pub fn remote(base_url: &str) -> Self {
        Self::Remote {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn deliver(&self, id: &ServiceId) {
        match self {
            BeaconTarget::Local(monitor) => monitor.report(id),
            BeaconTarget::Remote { base_url, client } => {
                let payload = HeartbeatRequest {
                    service_id: id.clone(),
                };
                let result = client
                    .post(format!("{}{}", base_url, ENDPOINT_HEARTBEAT))
                    .json(&payload)
                    .timeout(Duration::from_millis(500))
                    .send()
                    .await;
                match result {
                    Ok(resp) if resp.status().is_success() => {
                        tracing::trace!("{}: heartbeat delivered", id)
                    }
                    Ok(resp) => tracing::warn!("{}: heartbeat rejected: {}", id, resp.status()),
                    Err(e) => tracing::warn!("{}: heartbeat failed: {}", id, e),
                }
            }
        }
    }
}

/// A data service's periodic liveness report.
pub struct Beacon {
    enabled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Beacon {
    /// Reports every `interval` until `is_up` returns false.
    pub fn spawn<F>(id: ServiceId, target: BeaconTarget, interval: Duration, is_up: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        let enabled = Arc::new(AtomicBool::new(true));
        let flag = enabled.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !is_up() {
                    tracing::debug!("{}: service stopped, beacon exiting", id);
                    break;
                }
                if flag.load(Ordering::SeqCst) {
                    target.deliver(&id).await;
                }
            }
        });

        Self { enabled, task }
    }

    /// Stops sending reports without stopping the task.
    pub fn pause(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        !self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}
