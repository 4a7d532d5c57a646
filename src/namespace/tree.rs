use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::dataservice::types::ServiceId;
use crate::error::{DfsError, Result};

pub const SNAPSHOT_FILE: &str = "namespace.bin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileState {
    /// Registered; chunks are still being replicated.
    Pending,
    Complete,
}

/// Namespace entry for one file.
///
/// `replicas` is the placement chosen at upload time. Reads target exactly these
/// services instead of probing the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub size: u64,
    pub chunks: u64,
    pub replicas: Vec<ServiceId>,
    pub state: FileState,
}

impl FileRecord {
    pub fn pending(replicas: Vec<ServiceId>) -> Self {
        Self {
            size: 0,
            chunks: 0,
            replicas,
            state: FileState::Pending,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == FileState::Complete
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirNode {
    pub dirs: BTreeMap<String, DirNode>,
    pub files: BTreeMap<String, FileRecord>,
}

impl DirNode {
    fn collect_records(&self, prefix: &str, out: &mut Vec<(String, FileRecord)>) {
        for (name, record) in &self.files {
            out.push((join(prefix, name), record.clone()));
        }
        for (name, child) in &self.dirs {
            child.collect_records(&join(prefix, name), out);
        }
    }
}

/// Sorted contents of one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

/// Path segments, ignoring empty ones. `""`, `"/"` and `"a//b/"` are all valid.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Canonical form of `path`: segments joined by `/`, no leading or trailing slash.
pub fn normalize(path: &str) -> String {
    segments(path).join("/")
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Splits a file path into its parent directory segments and file name.
fn split_file(path: &str) -> Result<(Vec<&str>, &str)> {
    let mut segs = segments(path);
    match segs.pop() {
        Some(name) => Ok((segs, name)),
        None => Err(DfsError::InvalidPath(format!("'{}' names no file", path))),
    }
}

pub struct Namespace {
    root: DirNode,
    snapshot_path: PathBuf,
}

impl Namespace {
    /// Loads the snapshot under `root_dir`, or starts an empty tree.
    pub fn open(root_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(root_dir)?;
        let snapshot_path = root_dir.join(SNAPSHOT_FILE);

        let root = if snapshot_path.is_file() {
            let bytes = std::fs::read(&snapshot_path)?;
            let root: DirNode = bincode::deserialize(&bytes)?;
            tracing::info!(
                "Loaded namespace snapshot with {} files",
                count_files(&root)
            );
            root
        } else {
            DirNode::default()
        };

        Ok(Self {
            root,
            snapshot_path,
        })
    }

    /// Writes the whole tree, replacing the previous snapshot atomically.
    pub fn save(&self) -> Result<()> {
        let bytes = bincode::serialize(&self.root)?;
        let tmp = self.snapshot_path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.snapshot_path)?;
        tracing::debug!("Namespace snapshot written to {:?}", self.snapshot_path);
        Ok(())
    }

    pub fn root(&self) -> &DirNode {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> Result<&DirNode> {
        let mut curr = &self.root;
        for seg in segments(path) {
            curr = curr
                .dirs
                .get(seg)
                .ok_or_else(|| DfsError::NotFound(format!("directory '{}'", path)))?;
        }
        Ok(curr)
    }

    fn resolve_segments_mut(&mut self, segs: &[&str], path: &str) -> Result<&mut DirNode> {
        let mut curr = &mut self.root;
        for seg in segs {
            curr = curr
                .dirs
                .get_mut(*seg)
                .ok_or_else(|| DfsError::NotFound(format!("directory '{}'", path)))?;
        }
        Ok(curr)
    }

    /// Creates every missing directory along `path`.
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let mut curr = &mut self.root;
        for seg in segments(path) {
            if curr.files.contains_key(seg) {
                return Err(DfsError::Conflict(format!(
                    "'{}' in '{}' is a file",
                    seg, path
                )));
            }
            curr = curr.dirs.entry(seg.to_string()).or_default();
        }
        Ok(())
    }

    /// Removes the directory at `path` with its whole subtree.
    ///
    /// Returns the records of every file that lived under it, keyed by full path.
    pub fn deldir(&mut self, path: &str) -> Result<Vec<(String, FileRecord)>> {
        let segs = segments(path);
        let Some((last, parents)) = segs.split_last() else {
            return Err(DfsError::InvalidPath("cannot delete the root".to_string()));
        };

        let parent = self.resolve_segments_mut(parents, path)?;
        let removed = parent
            .dirs
            .remove(*last)
            .ok_or_else(|| DfsError::NotFound(format!("directory '{}'", path)))?;

        let mut records = Vec::new();
        removed.collect_records(&segs.join("/"), &mut records);
        Ok(records)
    }

    /// Whether `path` names a file. The parent directory must exist.
    pub fn exists(&self, path: &str) -> Result<bool> {
        let (parents, name) = split_file(path)?;
        let dir = self.resolve(&parents.join("/"))?;
        Ok(dir.files.contains_key(name))
    }

    pub fn list(&self, path: &str) -> Result<Listing> {
        let dir = self.resolve(path)?;
        Ok(Listing {
            dirs: dir.dirs.keys().cloned().collect(),
            files: dir.files.keys().cloned().collect(),
        })
    }

    pub fn file(&self, path: &str) -> Result<&FileRecord> {
        let (parents, name) = split_file(path)?;
        self.resolve(&parents.join("/"))?
            .files
            .get(name)
            .ok_or_else(|| DfsError::NotFound(format!("file '{}'", path)))
    }

    fn file_mut(&mut self, path: &str) -> Result<&mut FileRecord> {
        let (parents, name) = split_file(path)?;
        self.resolve_segments_mut(&parents, path)?
            .files
            .get_mut(name)
            .ok_or_else(|| DfsError::NotFound(format!("file '{}'", path)))
    }

    /// Checks that `name` can be registered under `dir` without touching the tree.
    pub fn check_new_file(&self, dir: &str, name: &str) -> Result<String> {
        if name.is_empty() || name.contains('/') {
            return Err(DfsError::InvalidPath(format!(
                "'{}' is not a single file name",
                name
            )));
        }
        let node = self.resolve(dir)?;
        if node.dirs.contains_key(name) {
            return Err(DfsError::Conflict(format!(
                "'{}' in '{}' is a directory",
                name, dir
            )));
        }
        Ok(join(&normalize(dir), name))
    }

    /// Registers (or replaces) a file, returning the record it replaced.
    pub fn register_file(
        &mut self,
        dir: &str,
        name: &str,
        record: FileRecord,
    ) -> Result<Option<FileRecord>> {
        self.check_new_file(dir, name)?;
        let segs = segments(dir);
        let node = self.resolve_segments_mut(&segs, dir)?;
        Ok(node.files.insert(name.to_string(), record))
    }

    pub fn finalize_file(&mut self, path: &str, size: u64, chunks: u64) -> Result<()> {
        let record = self.file_mut(path)?;
        record.size = size;
        record.chunks = chunks;
        record.state = FileState::Complete;
        Ok(())
    }

    pub fn remove_file(&mut self, path: &str) -> Result<FileRecord> {
        let (parents, name) = split_file(path)?;
        self.resolve_segments_mut(&parents, path)?
            .files
            .remove(name)
            .ok_or_else(|| DfsError::NotFound(format!("file '{}'", path)))
    }

    /// Adds `service` to the replica set of `path`. Returns false if already present.
    pub fn adopt_replica(&mut self, path: &str, service: &ServiceId) -> Result<bool> {
        let record = self.file_mut(path)?;
        if record.replicas.contains(service) {
            return Ok(false);
        }
        record.replicas.push(service.clone());
        Ok(true)
    }

    /// Every file record in the tree with its full path, in path order per directory.
    pub fn records(&self) -> Vec<(String, FileRecord)> {
        let mut out = Vec::new();
        self.root.collect_records("", &mut out);
        out
    }
}

fn count_files(node: &DirNode) -> usize {
    node.files.len() + node.dirs.values().map(count_files).sum::<usize>()
}
