//! Namespace Module Tests
//!
//! ## Test Scopes
//! - **Tree Shape**: mkdir/deldir sequences leave exactly the surviving directories.
//! - **Files**: registration, existence checks, conflicts between files and directories.
//! - **Persistence**: snapshots survive a reopen.

#[cfg(test)]
mod tests {
    use crate::dataservice::types::ServiceId;
    use crate::error::DfsError;
    use crate::namespace::tree::{FileRecord, FileState, Namespace, normalize, segments};

    fn fresh() -> (tempfile::TempDir, Namespace) {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::open(dir.path()).unwrap();
        (dir, ns)
    }

    fn replicas() -> Vec<ServiceId> {
        vec![
            ServiceId::from("dataserver0"),
            ServiceId::from("dataserver1"),
            ServiceId::from("dataserver2"),
        ]
    }

    // ============================================================
    // PATH HANDLING
    // ============================================================

    #[test]
    fn test_segments_ignore_empty_parts() {
        assert_eq!(segments("/a//b/"), vec!["a", "b"]);
        assert!(segments("").is_empty());
        assert!(segments("///").is_empty());
        assert_eq!(normalize("/a//b/c.txt"), "a/b/c.txt");
    }

    #[test]
    fn test_empty_path_resolves_to_root() {
        let (_dir, ns) = fresh();
        assert!(ns.resolve("").is_ok());
        assert!(ns.resolve("/").is_ok());
    }

    // ============================================================
    // MKDIR / DELDIR
    // ============================================================

    #[test]
    fn test_mkdir_creates_missing_ancestors() {
        let (_dir, mut ns) = fresh();
        ns.mkdir("a/b/c").unwrap();

        assert_eq!(ns.list("").unwrap().dirs, vec!["a"]);
        assert_eq!(ns.list("a").unwrap().dirs, vec!["b"]);
        assert_eq!(ns.list("a/b").unwrap().dirs, vec!["c"]);
        assert!(ns.list("a/b/c").unwrap().dirs.is_empty());
    }

    #[test]
    fn test_mkdir_is_idempotent() {
        let (_dir, mut ns) = fresh();
        ns.mkdir("a/b").unwrap();
        let before = ns.root().clone();

        ns.mkdir("a/b").unwrap();
        ns.mkdir("/a/b/").unwrap();

        assert_eq!(ns.root(), &before);
    }

    #[test]
    fn test_deldir_removes_whole_subtree() {
        let (_dir, mut ns) = fresh();
        ns.mkdir("a/b/c").unwrap();
        ns.mkdir("a/d").unwrap();

        ns.deldir("a/b").unwrap();

        assert_eq!(ns.list("a").unwrap().dirs, vec!["d"]);
        assert!(matches!(ns.resolve("a/b/c"), Err(DfsError::NotFound(_))));
    }

    #[test]
    fn test_deldir_missing_paths_fail() {
        let (_dir, mut ns) = fresh();
        ns.mkdir("a").unwrap();

        assert!(matches!(ns.deldir("a/missing"), Err(DfsError::NotFound(_))));
        assert!(matches!(ns.deldir("nope/b"), Err(DfsError::NotFound(_))));
        assert!(matches!(ns.deldir(""), Err(DfsError::InvalidPath(_))));
    }

    #[test]
    fn test_mixed_sequence_keeps_surviving_dirs() {
        let (_dir, mut ns) = fresh();
        ns.mkdir("x/y").unwrap();
        ns.mkdir("x/z/w").unwrap();
        ns.mkdir("q").unwrap();
        ns.deldir("x/z").unwrap();
        ns.mkdir("x/z").unwrap();
        ns.deldir("q").unwrap();

        assert_eq!(ns.list("").unwrap().dirs, vec!["x"]);
        assert_eq!(ns.list("x").unwrap().dirs, vec!["y", "z"]);
        assert!(ns.list("x/z").unwrap().dirs.is_empty());
    }

    #[test]
    fn test_deldir_returns_contained_files() {
        let (_dir, mut ns) = fresh();
        ns.mkdir("a/b").unwrap();
        ns.register_file("a", "top.txt", FileRecord::pending(replicas()))
            .unwrap();
        ns.register_file("a/b", "deep.txt", FileRecord::pending(replicas()))
            .unwrap();

        let removed = ns.deldir("a").unwrap();
        let paths: Vec<String> = removed.into_iter().map(|(path, _)| path).collect();

        assert_eq!(paths, vec!["a/top.txt", "a/b/deep.txt"]);
    }

    // ============================================================
    // FILES
    // ============================================================

    #[test]
    fn test_register_and_exists() {
        let (_dir, mut ns) = fresh();
        ns.mkdir("a/b").unwrap();
        ns.register_file("a/b", "f.txt", FileRecord::pending(replicas()))
            .unwrap();

        assert!(ns.exists("a/b/f.txt").unwrap());
        assert!(!ns.exists("a/b/g.txt").unwrap());
        assert!(matches!(ns.exists("a/zz/f.txt"), Err(DfsError::NotFound(_))));
        assert!(matches!(ns.exists(""), Err(DfsError::InvalidPath(_))));
    }

    #[test]
    fn test_list_is_sorted() {
        let (_dir, mut ns) = fresh();
        ns.mkdir("zeta").unwrap();
        ns.mkdir("alpha").unwrap();
        ns.register_file("", "b.txt", FileRecord::pending(replicas()))
            .unwrap();
        ns.register_file("", "a.txt", FileRecord::pending(replicas()))
            .unwrap();

        let listing = ns.list("").unwrap();
        assert_eq!(listing.dirs, vec!["alpha", "zeta"]);
        assert_eq!(listing.files, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_file_and_directory_names_conflict() {
        let (_dir, mut ns) = fresh();
        ns.mkdir("a/b").unwrap();
        ns.register_file("a", "f", FileRecord::pending(replicas()))
            .unwrap();

        assert!(matches!(
            ns.register_file("a", "b", FileRecord::pending(replicas())),
            Err(DfsError::Conflict(_))
        ));
        assert!(matches!(ns.mkdir("a/f/g"), Err(DfsError::Conflict(_))));
        assert!(matches!(
            ns.register_file("a", "x/y", FileRecord::pending(replicas())),
            Err(DfsError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_finalize_and_remove() {
        let (_dir, mut ns) = fresh();
        ns.register_file("", "f", FileRecord::pending(replicas()))
            .unwrap();
        assert_eq!(ns.file("f").unwrap().state, FileState::Pending);

        ns.finalize_file("f", 11, 3).unwrap();
        let record = ns.file("f").unwrap();
        assert!(record.is_complete());
        assert_eq!((record.size, record.chunks), (11, 3));

        ns.remove_file("f").unwrap();
        assert!(!ns.exists("f").unwrap());
    }

    #[test]
    fn test_adopt_replica_once() {
        let (_dir, mut ns) = fresh();
        ns.register_file("", "f", FileRecord::pending(replicas()))
            .unwrap();

        let newcomer = ServiceId::from("dataserver3");
        assert!(ns.adopt_replica("f", &newcomer).unwrap());
        assert!(!ns.adopt_replica("f", &newcomer).unwrap());
        assert_eq!(ns.file("f").unwrap().replicas.len(), 4);
    }

    // ============================================================
    // PERSISTENCE
    // ============================================================

    #[test]
    fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut ns = Namespace::open(dir.path()).unwrap();
            ns.mkdir("a/b").unwrap();
            ns.register_file("a/b", "f.txt", FileRecord::pending(replicas()))
                .unwrap();
            ns.finalize_file("a/b/f.txt", 11, 3).unwrap();
            ns.save().unwrap();
        }

        let ns = Namespace::open(dir.path()).unwrap();
        let record = ns.file("a/b/f.txt").unwrap();
        assert_eq!(record.size, 11);
        assert_eq!(record.replicas, replicas());
        assert_eq!(ns.records().len(), 1);
    }
}
