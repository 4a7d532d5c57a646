use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dataservice::endpoint::Fleet;
use crate::dataservice::types::{ChunkDigest, DataCommand, DataReply, ServiceId, StoreDigest};
use crate::error::{DfsError, Result};
use crate::namespace::tree::FileRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchKind {
    /// The replica could not be asked for its digest.
    Unreachable(String),
    /// The replica does not index the file at all.
    Missing,
    /// An indexed chunk file is gone from disk.
    MissingChunk,
    /// Chunk names differ from the reference replica's.
    Names,
    /// Same chunk names, different content.
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub path: String,
    pub replica: ServiceId,
    pub reference: Option<ServiceId>,
    pub kind: MismatchKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub files_checked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Audits every complete file in `records` against the digests of its replicas.
pub async fn check_integrity(records: &[(String, FileRecord)], fleet: &Fleet) -> IntegrityReport {
    let mut digests: HashMap<ServiceId, Result<StoreDigest>> = HashMap::new();
    for endpoint in fleet.iter() {
        let digest = match endpoint.call(DataCommand::Digest).await {
            Ok(DataReply::Digest { files }) => Ok(files),
            Ok(other) => Err(DfsError::Codec(format!("unexpected reply to digest: {:?}", other))),
            Err(e) => Err(e),
        };
        digests.insert(endpoint.id().clone(), digest);
    }

    let mut report = IntegrityReport::default();
    for (path, record) in records.iter().filter(|(_, r)| r.is_complete()) {
        report.files_checked += 1;
        audit_file(path, record, &digests, &mut report.mismatches);
    }

    if report.is_consistent() {
        tracing::info!("Integrity check passed for {} files", report.files_checked);
    } else {
        tracing::warn!(
            "Integrity check found {} mismatches across {} files",
            report.mismatches.len(),
            report.files_checked
        );
    }
    report
}

fn audit_file(
    path: &str,
    record: &FileRecord,
    digests: &HashMap<ServiceId, Result<StoreDigest>>,
    mismatches: &mut Vec<Mismatch>,
) {
    // First replica holding a complete copy.
    let reference = record.replicas.iter().find_map(|id| {
        lookup(digests, path, id)
            .ok()
            .filter(|chunks| chunks.iter().all(|c| c.sha256.is_some()))
            .map(|chunks| (id, chunks))
    });

    for id in &record.replicas {
        let kind = match lookup(digests, path, id) {
            Err(kind) => Some(kind),
            Ok(chunks) if chunks.iter().any(|c| c.sha256.is_none()) => Some(MismatchKind::MissingChunk),
            Ok(chunks) => reference.and_then(|(_, expected)| compare(expected, chunks)),
        };

        if let Some(kind) = kind {
            tracing::warn!("Replica {} of '{}' disagrees: {:?}", id, path, kind);
            mismatches.push(Mismatch {
                path: path.to_string(),
                replica: id.clone(),
                reference: reference.map(|(r, _)| r.clone()),
                kind,
            });
        }
    }
}

fn lookup<'a>(
    digests: &'a HashMap<ServiceId, Result<StoreDigest>>,
    path: &str,
    id: &ServiceId,
) -> std::result::Result<&'a Vec<ChunkDigest>, MismatchKind> {
    match digests.get(id) {
        None => Err(MismatchKind::Unreachable(format!("{} is not in the fleet", id))),
        Some(Err(e)) => Err(MismatchKind::Unreachable(e.to_string())),
        Some(Ok(store)) => store.get(path).ok_or(MismatchKind::Missing),
    }
}

fn compare(expected: &[ChunkDigest], actual: &[ChunkDigest]) -> Option<MismatchKind> {
    let names = |chunks: &[ChunkDigest]| {
        let mut names: Vec<String> = chunks.iter().map(|c| c.name.clone()).collect();
        names.sort();
        names
    };

    if names(expected) != names(actual) {
        return Some(MismatchKind::Names);
    }
    let hashes = |chunks: &[ChunkDigest]| {
        let mut pairs: Vec<(String, Option<String>)> = chunks
            .iter()
            .map(|c| (c.name.clone(), c.sha256.clone()))
            .collect();
        pairs.sort();
        pairs
    };
    if hashes(expected) != hashes(actual) {
        return Some(MismatchKind::Content);
    }
    None
}

/// Paths held by `source` that `target` is missing or holds with different chunks.
pub fn diff_digests(source: &StoreDigest, target: &StoreDigest) -> Vec<String> {
    source
        .iter()
        .filter(|(path, chunks)| {
            target
                .get(*path)
                .is_none_or(|other| compare(chunks, other).is_some())
        })
        .map(|(path, _)| path.clone())
        .collect()
}
