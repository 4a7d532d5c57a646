//! Cluster Tests
//!
//! End-to-end scenarios against an in-process cluster rooted in a temporary directory.
//!
//! ## Test Scopes
//! - **Round Trips**: upload/download for empty, sub-chunk, exact and ragged sizes.
//! - **Range Reads**: every window equals the matching slice of the download.
//! - **Replication**: exactly three holders, identical content.
//! - **Failures**: stopped replicas, missing local files, concurrent callers.
//! - **Durability & Liveness**: restart from disk, beacon-driven state changes.

#[cfg(test)]
mod tests {
    use crate::cluster::Cluster;
    use crate::config::DfsConfig;
    use crate::dataservice::store::chunk_name;
    use crate::dataservice::types::{DataCommand, DataReply, ServiceId};
    use crate::error::DfsError;
    use crate::liveness::types::Liveness;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn start(root: &Path, chunk_size: usize) -> Cluster {
        let mut config = DfsConfig::with_root(root);
        config.chunk_size = chunk_size;
        Cluster::start(config).unwrap()
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    async fn holders(cluster: &Cluster, path: &str) -> Vec<ServiceId> {
        let mut out = Vec::new();
        for handle in cluster.data_services() {
            if let DataReply::Digest { files } = handle.call(DataCommand::Digest).await.unwrap()
                && files.contains_key(path)
            {
                out.push(handle.id().clone());
            }
        }
        out
    }

    // ============================================================
    // ROUND TRIPS
    // ============================================================

    #[tokio::test]
    async fn test_round_trip_sizes_through_local_files() {
        let dir = TempDir::new().unwrap();
        let cluster = start(&dir.path().join("dfs"), 8);
        let client = cluster.client();
        client.mkdir("data").await.unwrap();

        let local = dir.path().join("local");
        let saved = dir.path().join("saved");
        std::fs::create_dir_all(&local).unwrap();

        // Empty, shorter than a chunk, exactly k chunks, k chunks plus a remainder.
        for (name, size, chunks) in [("s0", 0, 0), ("s5", 5, 1), ("s24", 24, 3), ("s27", 27, 4)] {
            let content = pattern(size);
            let file = local.join(name);
            std::fs::write(&file, &content).unwrap();

            let summary = client.upload(&file, "data").await.unwrap();
            assert_eq!(summary.size, size as u64);
            assert_eq!(summary.chunks, chunks);

            let written = client
                .download(&format!("data/{}", name), &saved)
                .await
                .unwrap();
            assert_eq!(written, saved.join(name));
            assert_eq!(std::fs::read(&written).unwrap(), content);
        }
    }

    #[tokio::test]
    async fn test_hello_world_scenario() {
        let dir = TempDir::new().unwrap();
        let cluster = start(dir.path(), 4);
        let client = cluster.client();
        client.mkdir("docs").await.unwrap();

        let summary = client
            .upload_bytes("docs", "hello.txt", b"hello world")
            .await
            .unwrap();
        assert_eq!(summary.chunks, 3);

        let replica = cluster.data_service(&summary.replicas[0]).unwrap();
        let parts: Vec<Vec<u8>> = (0..3)
            .map(|seq| std::fs::read(replica.root().join(chunk_name("docs/hello.txt", seq))).unwrap())
            .collect();
        assert_eq!(parts, vec![b"hell".to_vec(), b"o wo".to_vec(), b"rld".to_vec()]);

        assert_eq!(client.read_range("docs/hello.txt", 3, 5).await.unwrap(), b"lo wo");
    }

    #[tokio::test]
    async fn test_empty_range_inside_chunk_does_not_disturb_later_reads() {
        let dir = TempDir::new().unwrap();
        let cluster = start(dir.path(), 4);
        let client = cluster.client();
        client.mkdir("a/b").await.unwrap();
        client
            .upload_bytes("a/b", "f.txt", b"hello world")
            .await
            .unwrap();

        assert!(client.read_range("a/b/f.txt", 3, 0).await.unwrap().is_empty());
        assert_eq!(client.read_range("a/b/f.txt", 3, 5).await.unwrap(), b"lo wo");
        assert_eq!(client.fetch("a/b/f.txt").await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_range_reads_match_download_slices() {
        let dir = TempDir::new().unwrap();
        let cluster = start(dir.path(), 4);
        let client = cluster.client();

        let content = pattern(23);
        client.upload_bytes("", "f", &content).await.unwrap();
        let whole = client.fetch("f").await.unwrap();
        assert_eq!(whole, content);

        // Within one chunk, on boundaries, across several chunks, empty, to the end.
        for (offset, length) in [(1, 2), (4, 4), (3, 6), (2, 17), (8, 0), (0, 23), (20, 3)] {
            let bytes = client.read_range("f", offset, length).await.unwrap();
            assert_eq!(
                bytes,
                &whole[offset as usize..(offset + length) as usize],
                "window {}+{}",
                offset,
                length
            );
        }

        let err = client.read_range("f", 20, 4).await.unwrap_err();
        assert_eq!(
            err,
            DfsError::OutOfRange {
                offset: 20,
                length: 4,
                size: 23
            }
        );
    }

    // ============================================================
    // REPLICATION
    // ============================================================

    #[tokio::test]
    async fn test_each_file_has_exactly_three_identical_replicas() {
        let dir = TempDir::new().unwrap();
        let cluster = start(dir.path(), 4);
        let client = cluster.client();

        for i in 0..6 {
            client
                .upload_bytes("", &format!("f{}", i), &pattern(10 + i))
                .await
                .unwrap();
        }

        for i in 0..6 {
            let path = format!("f{}", i);
            let mut held = holders(&cluster, &path).await;
            let mut recorded = client.stat(&path).await.unwrap().replicas;
            held.sort();
            recorded.sort();
            assert_eq!(held.len(), 3);
            assert_eq!(held, recorded);
        }

        let report = client.check_integrity().await.unwrap();
        assert_eq!(report.files_checked, 6);
        assert!(report.is_consistent(), "{:?}", report.mismatches);
    }

    #[tokio::test]
    async fn test_reupload_replaces_content() {
        let dir = TempDir::new().unwrap();
        let cluster = start(dir.path(), 4);
        let client = cluster.client();

        client.upload_bytes("", "f", b"first version").await.unwrap();
        let summary = client.upload_bytes("", "f", b"v2").await.unwrap();
        assert_eq!(client.fetch("f").await.unwrap(), b"v2");

        let mut held = holders(&cluster, "f").await;
        let mut expected = summary.replicas;
        held.sort();
        expected.sort();
        assert_eq!(held, expected);
    }

    // ============================================================
    // FAILURES
    // ============================================================

    #[tokio::test]
    async fn test_download_survives_stopped_replica() {
        let dir = TempDir::new().unwrap();
        let mut cluster = start(dir.path(), 4);
        let client = cluster.client();

        let content = pattern(30);
        let summary = client.upload_bytes("", "f", &content).await.unwrap();
        cluster.stop_data_service(&summary.replicas[0]).await.unwrap();

        assert_eq!(client.fetch("f").await.unwrap(), content);
        assert_eq!(client.read_range("f", 5, 20).await.unwrap(), &content[5..25]);
    }

    #[tokio::test]
    async fn test_missing_local_file_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let cluster = start(&dir.path().join("dfs"), 4);
        let client = cluster.client();

        let err = client
            .upload(&dir.path().join("absent.bin"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, DfsError::NotFound(_)));
        assert!(!client.exists("absent.bin").await.unwrap());

        // The name service is still usable.
        client.upload_bytes("", "ok", b"fine").await.unwrap();
        assert_eq!(client.fetch("ok").await.unwrap(), b"fine");
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let cluster = start(&dir.path().join("dfs"), 4);
        let client = cluster.client();

        let err = client
            .download("missing.txt", &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, DfsError::NotFound(_)));
        assert!(!dir.path().join("out").join("missing.txt").exists());
    }

    #[tokio::test]
    async fn test_unreachable_name_service_leaves_no_download() {
        let dir = TempDir::new().unwrap();
        let cluster = start(&dir.path().join("dfs"), 4);
        let client = cluster.client();
        client.upload_bytes("", "f.txt", b"payload").await.unwrap();

        client.shutdown().await.unwrap();
        while cluster.name_service().is_running() {
            tokio::task::yield_now().await;
        }

        let out = dir.path().join("out");
        let err = client.download("f.txt", &out).await.unwrap_err();
        assert!(matches!(err, DfsError::Unreachable(_)));
        assert!(!out.join("f.txt").exists());
    }

    #[tokio::test]
    async fn test_concurrent_callers_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let cluster = start(dir.path(), 4);

        let mut tasks = Vec::new();
        for i in 0..4 {
            let client = cluster.client();
            tasks.push(tokio::spawn(async move {
                let name = format!("f{}", i);
                let content = vec![i as u8; 37];
                client.upload_bytes("", &name, &content).await.unwrap();
                assert_eq!(client.fetch(&name).await.unwrap(), content);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_abandoned_read_does_not_leak_into_next() {
        let dir = TempDir::new().unwrap();
        let cluster = start(dir.path(), 4);
        let client = cluster.client();
        client.upload_bytes("", "a", b"aaaaaaaaaaaa").await.unwrap();
        client.upload_bytes("", "b", b"bbbb").await.unwrap();

        let mut stream = client.open("a").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), b"aaaa");
        drop(stream);

        assert_eq!(client.fetch("b").await.unwrap(), b"bbbb");
    }

    // ============================================================
    // DURABILITY & LIVENESS
    // ============================================================

    #[tokio::test]
    async fn test_restart_restores_namespace_and_chunks() {
        let dir = TempDir::new().unwrap();
        let content = pattern(19);
        {
            let cluster = start(dir.path(), 4);
            let client = cluster.client();
            client.mkdir("keep/me").await.unwrap();
            client.upload_bytes("keep/me", "f", &content).await.unwrap();
            cluster.shutdown().await.unwrap();
        }

        let cluster = start(dir.path(), 4);
        let client = cluster.client();
        let listing = client.list("keep/me").await.unwrap();
        assert_eq!(listing.files, vec!["f".to_string()]);
        assert_eq!(client.fetch("keep/me/f").await.unwrap(), content);
        assert!(client.check_integrity().await.unwrap().is_consistent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_beacon_is_suspected_then_recovers() {
        let dir = TempDir::new().unwrap();
        let cluster = start(dir.path(), 4);
        let client = cluster.client();
        let id = ServiceId::from("dataserver1");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.liveness(&id), Some(Liveness::Alive));

        let beacon = cluster.beacon(&id).unwrap();
        beacon.pause();
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(client.liveness(&id), Some(Liveness::Suspected));
        assert_eq!(
            client.liveness(&ServiceId::from("dataserver0")),
            Some(Liveness::Alive)
        );

        beacon.resume();
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(client.liveness(&id), Some(Liveness::Alive));
    }
}
