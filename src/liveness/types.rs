use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Liveness {
    /// Last report is within the timeout.
    Alive,
    /// Timeout exceeded. Still addressable, and may recover on the next report.
    Suspected,
}

#[derive(Debug, Clone)]
pub struct ServiceHealth {
    pub state: Liveness,
    pub last_seen: Instant,
    pub reports: u64,
}

impl ServiceHealth {
    pub fn new(now: Instant) -> Self {
        Self {
            state: Liveness::Alive,
            last_seen: now,
            reports: 0,
        }
    }
}
