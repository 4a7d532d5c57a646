//! Channel Protocol Tests
//!
//! ## Test Scopes
//! - **Mailbox**: single-slot admission, ticket completion, closed mailboxes.
//! - **Lanes**: FIFO order, terminators, draining, closed lanes.

#[cfg(test)]
mod tests {
    use crate::channel::lane::lane;
    use crate::channel::mailbox::mailbox;
    use crate::channel::types::Chunk;
    use crate::error::DfsError;
    use std::time::Duration;

    // ============================================================
    // MAILBOX TESTS
    // ============================================================

    #[tokio::test]
    async fn test_mailbox_admits_one_command_at_a_time() {
        let (mailbox, mut rx) = mailbox::<u32, u32>("svc");

        // First command fills the slot without waiting.
        let _first = mailbox.submit(1).await.unwrap();

        // Second command must wait for the slot to drain.
        let blocked = tokio::time::timeout(Duration::from_millis(50), mailbox.submit(2)).await;
        assert!(blocked.is_err(), "submit should block while the slot is full");

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.command, 1);

        let second = tokio::time::timeout(Duration::from_millis(500), mailbox.submit(2)).await;
        assert!(second.is_ok(), "slot should be free after the loop took a command");
    }

    #[tokio::test]
    async fn test_ticket_resolves_with_reply() {
        let (mailbox, mut rx) = mailbox::<u32, u32>("svc");

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let value = envelope.command * 2;
                envelope.respond(Ok(value));
            }
        });

        assert_eq!(mailbox.call(21).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_closed_mailbox_is_unreachable() {
        let (mailbox, rx) = mailbox::<u32, u32>("svc-down");
        drop(rx);

        let result = mailbox.submit(1).await;
        assert!(matches!(result, Err(DfsError::Unreachable(ref who)) if who == "svc-down"));
        assert!(mailbox.is_closed());
    }

    #[tokio::test]
    async fn test_dropped_reply_is_unreachable() {
        let (mailbox, mut rx) = mailbox::<u32, u32>("svc");
        let ticket = mailbox.submit(7).await.unwrap();

        // The loop takes the command and dies before answering.
        let envelope = rx.recv().await.unwrap();
        drop(envelope);

        assert!(matches!(ticket.wait().await, Err(DfsError::Unreachable(_))));
    }

    // ============================================================
    // LANE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_lane_preserves_order() {
        let (tx, rx) = lane("svc");

        for i in 0..5u64 {
            tx.push_chunk(i, vec![i as u8 + 1]).unwrap();
        }
        tx.finish(5).unwrap();

        for i in 0..5u64 {
            let chunk = rx.pull().await.unwrap();
            assert_eq!(chunk.seq, i);
            assert!(!chunk.is_end());
        }
        assert!(rx.pull().await.unwrap().is_end());
    }

    #[tokio::test]
    async fn test_drain_stops_at_terminator() {
        let (tx, rx) = lane("svc");

        tx.push_chunk(0, b"ab".to_vec()).unwrap();
        tx.push_chunk(1, b"cd".to_vec()).unwrap();
        tx.finish(2).unwrap();
        tx.push_chunk(0, b"next".to_vec()).unwrap();

        assert_eq!(rx.drain().await, 2);

        // The following stream is untouched.
        let next = rx.pull().await.unwrap();
        assert_eq!(next, Chunk::new(0, b"next".to_vec()));
    }

    #[tokio::test]
    async fn test_drain_stops_at_fault() {
        let (tx, rx) = lane("svc");

        tx.push_chunk(0, b"ab".to_vec()).unwrap();
        tx.fault(DfsError::Aborted("client gone".to_string())).unwrap();

        assert_eq!(rx.drain().await, 1);
    }

    #[tokio::test]
    async fn test_clear_discards_queued_items_without_waiting() {
        let (tx, rx) = lane("svc");
        assert_eq!(rx.clear().await, 0);

        tx.push_chunk(0, b"ab".to_vec()).unwrap();
        tx.finish(1).unwrap();
        tx.finish(0).unwrap();
        assert_eq!(rx.clear().await, 3);

        tx.push_chunk(0, b"fresh".to_vec()).unwrap();
        assert_eq!(rx.pull().await.unwrap(), Chunk::new(0, b"fresh".to_vec()));
    }

    #[tokio::test]
    async fn test_closed_lane_reads_as_unreachable() {
        let (tx, rx) = lane("svc");
        drop(tx);

        assert!(matches!(rx.pull().await, Err(DfsError::Unreachable(_))));
    }
}
