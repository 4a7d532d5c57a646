//! Liveness Module Tests
//!
//! Runs on a paused tokio clock so timeouts elapse instantly.
//!
//! ## Test Scopes
//! - **Monitor**: Alive -> Suspected -> Alive transitions, ranking.
//! - **Beacon**: periodic reports keep a service alive; pausing lets it be suspected.

#[cfg(test)]
mod tests {
    use crate::dataservice::types::ServiceId;
    use crate::liveness::beacon::{Beacon, BeaconTarget};
    use crate::liveness::monitor::LivenessMonitor;
    use crate::liveness::types::Liveness;
    use std::time::Duration;

    // ============================================================
    // MONITOR
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_silent_service_becomes_suspected() {
        let monitor = LivenessMonitor::new(Duration::from_secs(30));
        let id = ServiceId::from("ds0");
        monitor.register(id.clone());

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(monitor.sweep().is_empty());
        assert_eq!(monitor.state(&id), Some(Liveness::Alive));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(monitor.sweep(), vec![id.clone()]);
        assert_eq!(monitor.state(&id), Some(Liveness::Suspected));

        // Already suspected, not flagged twice.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(monitor.sweep().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_revives_suspected_service() {
        let monitor = LivenessMonitor::new(Duration::from_secs(30));
        let id = ServiceId::from("ds0");
        monitor.register(id.clone());

        tokio::time::advance(Duration::from_secs(31)).await;
        monitor.sweep();
        assert_eq!(monitor.state(&id), Some(Liveness::Suspected));

        monitor.report(&id);
        assert_eq!(monitor.state(&id), Some(Liveness::Alive));
        assert!(monitor.sweep().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_from_unknown_service_registers_it() {
        let monitor = LivenessMonitor::new(Duration::from_secs(30));
        let id = ServiceId::from("late");

        assert_eq!(monitor.state(&id), None);
        monitor.report(&id);
        assert_eq!(monitor.state(&id), Some(Liveness::Alive));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rank_puts_alive_services_first() {
        let monitor = LivenessMonitor::new(Duration::from_secs(30));
        let ids: Vec<ServiceId> = ["ds0", "ds1", "ds2"]
            .into_iter()
            .map(ServiceId::from)
            .collect();
        for id in &ids {
            monitor.register(id.clone());
        }

        tokio::time::advance(Duration::from_secs(31)).await;
        monitor.report(&ids[2]);
        monitor.sweep();

        let ranked = monitor.rank(&ids);
        assert_eq!(ranked, vec![ids[2].clone(), ids[0].clone(), ids[1].clone()]);
    }

    // ============================================================
    // BEACON
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_beacon_drives_state_machine() {
        let monitor = LivenessMonitor::new(Duration::from_secs(30));
        let id = ServiceId::from("ds0");
        monitor.register(id.clone());

        let _poller = monitor.clone().start(Duration::from_secs(1));
        let beacon = Beacon::spawn(
            id.clone(),
            BeaconTarget::Local(monitor.clone()),
            Duration::from_secs(10),
            || true,
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(monitor.state(&id), Some(Liveness::Alive));

        beacon.pause();
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(monitor.state(&id), Some(Liveness::Suspected));

        beacon.resume();
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(monitor.state(&id), Some(Liveness::Alive));

        beacon.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_beacon_exits_when_service_is_down() {
        let monitor = LivenessMonitor::new(Duration::from_secs(30));
        let beacon = Beacon::spawn(
            ServiceId::from("ds0"),
            BeaconTarget::Local(monitor.clone()),
            Duration::from_secs(10),
            || false,
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(beacon.is_finished());
        assert_eq!(monitor.state(&ServiceId::from("ds0")), None);
    }
}
