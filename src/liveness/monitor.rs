use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::types::{Liveness, ServiceHealth};
use crate::dataservice::types::ServiceId;

pub struct LivenessMonitor {
    services: DashMap<ServiceId, ServiceHealth>,
    timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            services: DashMap::new(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Starts tracking `id` as alive from now.
    pub fn register(&self, id: ServiceId) {
        self.services.insert(id, ServiceHealth::new(Instant::now()));
    }

    /// Records a beacon from `id`.
    pub fn report(&self, id: &ServiceId) {
        let now = Instant::now();
        match self.services.get_mut(id) {
            Some(mut health) => {
                if health.state == Liveness::Suspected {
                    tracing::info!(
                        "Data service {} is alive again after {:?}",
                        id,
                        now.duration_since(health.last_seen)
                    );
                }
                health.state = Liveness::Alive;
                health.last_seen = now;
                health.reports += 1;
            }
            None => {
                tracing::info!("Heartbeat from unregistered data service {}, tracking it", id);
                let mut health = ServiceHealth::new(now);
                health.reports = 1;
                self.services.insert(id.clone(), health);
            }
        }
    }

    pub fn state(&self, id: &ServiceId) -> Option<Liveness> {
        self.services.get(id).map(|health| health.state)
    }

    /// Every tracked service with its state and time since its last report, sorted by id.
    pub fn snapshot(&self) -> Vec<(ServiceId, Liveness, Duration)> {
        let now = Instant::now();
        let mut out: Vec<_> = self
            .services
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().state,
                    now.duration_since(entry.value().last_seen),
                )
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Flags every service whose last report is older than the timeout.
    ///
    /// Returns the services that became `Suspected` during this sweep.
    pub fn sweep(&self) -> Vec<ServiceId> {
        let now = Instant::now();
        let mut flagged = Vec::new();

        for mut entry in self.services.iter_mut() {
            let elapsed = now.duration_since(entry.value().last_seen);
            if elapsed <= self.timeout {
                continue;
            }

            match entry.value().state {
                Liveness::Alive => {
                    tracing::warn!(
                        "No heartbeat from data service {} for {:?} (timeout {:?})",
                        entry.key(),
                        elapsed,
                        self.timeout
                    );
                    entry.value_mut().state = Liveness::Suspected;
                    flagged.push(entry.key().clone());
                }
                Liveness::Suspected => {
                    tracing::debug!(
                        "Data service {} still suspected (no contact for {:?})",
                        entry.key(),
                        elapsed
                    );
                }
            }
        }

        flagged
    }

    /// Orders `ids` with alive services first, keeping the given order otherwise.
    pub fn rank(&self, ids: &[ServiceId]) -> Vec<ServiceId> {
        let mut ranked = ids.to_vec();
        ranked.sort_by_key(|id| self.state(id) == Some(Liveness::Suspected));
        ranked
    }

    /// Spawns the polling loop.
    pub fn start(self: Arc<Self>, cadence: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            loop {
                interval.tick().await;
                self.sweep();
            }
        })
    }
}
