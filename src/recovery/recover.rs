use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dataservice::endpoint::Fleet;
use crate::dataservice::types::{DataCommand, DataReply, ServiceId};
use crate::error::{DfsError, Result};
use crate::liveness::monitor::LivenessMonitor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub source: ServiceId,
    pub target: ServiceId,
    /// Paths of every file the source held, now held by the target too.
    pub files: Vec<String>,
    pub copied_bytes: u64,
}

/// Copies another data service's storage root onto `target`'s and merges its index.
///
/// Sources are tried alive-first; the first one that flushes its index is used.
pub async fn recover(
    fleet: &Fleet,
    monitor: &LivenessMonitor,
    target: &ServiceId,
) -> Result<RecoveryReport> {
    let target_endpoint = fleet.get(target)?;
    let target_root = target_endpoint
        .storage_root()
        .ok_or_else(|| DfsError::Unsupported(format!("{} has no local storage root", target)))?;

    let others: Vec<ServiceId> = fleet.ids().into_iter().filter(|id| id != target).collect();
    let mut last_error = DfsError::NotFound(format!("no data service besides {}", target));

    for source in monitor.rank(&others) {
        let endpoint = fleet.get(&source)?;
        let Some(source_root) = endpoint.storage_root() else {
            last_error = DfsError::Unsupported(format!("{} has no local storage root", source));
            continue;
        };

        let files = match endpoint.call(DataCommand::Flush).await {
            Ok(DataReply::Flushed { files }) => files,
            Ok(other) => {
                last_error = DfsError::Codec(format!("unexpected reply to flush: {:?}", other));
                continue;
            }
            Err(e) => {
                tracing::warn!("Recovery source {} unavailable: {}", source, e);
                last_error = e;
                continue;
            }
        };

        tracing::info!(
            "Recovering {} from {} ({} files)",
            target,
            source,
            files.len()
        );
        let copied_bytes = copy_tree(&source_root, &target_root).await?;
        target_endpoint.call(DataCommand::Reload).await?;

        tracing::info!(
            "Recovery of {} complete: {} bytes copied from {}",
            target,
            copied_bytes,
            source
        );
        return Ok(RecoveryReport {
            source,
            target: target.clone(),
            files,
            copied_bytes,
        });
    }

    Err(last_error)
}

/// Recursively copies `from` onto `to`, overwriting existing files.
async fn copy_tree(from: &Path, to: &Path) -> Result<u64> {
    let mut copied = 0u64;
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];

    while let Some((src, dst)) = pending.pop() {
        tokio::fs::create_dir_all(&dst).await?;
        let mut entries = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let dst_path = dst.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), dst_path));
            } else {
                copied += tokio::fs::copy(entry.path(), &dst_path).await?;
            }
        }
    }

    Ok(copied)
}
