//! Liveness Module
//!
//! Heartbeat-based failure detection for the data-service fleet.
//!
//! ## Core Mechanisms
//! - **Beacon**: every data service reports on a fixed interval, either straight into an
//!   in-process monitor or over HTTP to the name node.
//! - **Monitor**: the name service polls elapsed time since each service's last report.
//!   Past the timeout a service becomes `Suspected`; its next report makes it `Alive`
//!   again. There is no terminal state and no automatic remediation.
//!
//! The monitor only owns timestamps. It never touches the namespace or any chunk index.

pub mod beacon;
pub mod monitor;
pub mod types;

#[cfg(test)]
mod tests;
