//! Directory listing, diffing and subtree replication
//!
//! This module provides the folder-level half of the sync: listing the names
//! below a directory, diffing two such listings, copying a whole subtree from
//! the library onto the device and removing stale entries from the device.
//!
//! compio has no native directory iterator or recursive delete, so those calls
//! go through [`compio::runtime::spawn_blocking`] and are awaited immediately.

use crate::copy::copy_file;
use crate::error::{CopyFailure, Result, SyncError};
use async_recursion::async_recursion;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Names of the immediate children of a directory
pub type ChildSet = BTreeSet<String>;

/// Result of comparing the children of a source and a target directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderDiff {
    /// Names present in the source but not in the target
    pub added: ChildSet,
    /// Names present in the target but not in the source
    pub removed: ChildSet,
}

impl FolderDiff {
    /// True when both directories hold the same names
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Subtree replication statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeStats {
    /// Total number of directories created
    pub directories_created: u64,
    /// Total number of files copied
    pub files_copied: u64,
    /// Total number of bytes copied
    pub bytes_copied: u64,
}

/// Run a blocking filesystem call on compio's blocking pool and wait for it
async fn run_blocking<T, F>(what: String, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
{
    compio::runtime::spawn_blocking(op)
        .await
        .map_err(|e| SyncError::Internal(format!("{what}: blocking task panicked: {e:?}")))?
        .map_err(|e| SyncError::FileSystem(format!("{what}: {e}")))
}

/// List the names of the immediate children of `dir`
///
/// # Errors
///
/// Returns `SyncError::DirectoryTraversal` if `dir` cannot be read or holds
/// a name that is not valid UTF-8.
pub async fn list_children(dir: &Path) -> Result<ChildSet> {
    let owned = dir.to_path_buf();
    let names = compio::runtime::spawn_blocking(move || -> std::io::Result<Vec<_>> {
        std::fs::read_dir(&owned)?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect()
    })
    .await
    .map_err(|e| SyncError::Internal(format!("directory listing task panicked: {e:?}")))?
    .map_err(|e| {
        SyncError::DirectoryTraversal(format!("Failed to read directory {}: {}", dir.display(), e))
    })?;

    names
        .into_iter()
        .map(|name| {
            name.into_string().map_err(|raw| {
                SyncError::DirectoryTraversal(format!(
                    "Non UTF-8 name {:?} in {}",
                    raw,
                    dir.display()
                ))
            })
        })
        .collect()
}

/// Compare the children of `source` against those of `target`
///
/// Names are compared exactly, without case folding. Nothing on disk changes.
///
/// # Errors
///
/// Returns an error if either directory cannot be listed.
pub async fn diff_children(source: &Path, target: &Path) -> Result<FolderDiff> {
    let source_names = list_children(source).await?;
    let target_names = list_children(target).await?;

    let diff = FolderDiff {
        added: source_names.difference(&target_names).cloned().collect(),
        removed: target_names.difference(&source_names).cloned().collect(),
    };
    debug!(
        "diff {} vs {}: {} added, {} removed",
        source.display(),
        target.display(),
        diff.added.len(),
        diff.removed.len()
    );
    Ok(diff)
}

/// Delete a file or a whole directory tree
///
/// # Errors
///
/// Returns `SyncError::FileSystem` if the entry cannot be removed.
pub async fn remove_entry(path: &Path) -> Result<()> {
    if path.is_dir() {
        let owned = path.to_path_buf();
        run_blocking(format!("Failed to remove directory {}", path.display()), move || {
            std::fs::remove_dir_all(owned)
        })
        .await?;
    } else {
        compio::fs::remove_file(path).await.map_err(|e| {
            SyncError::FileSystem(format!("Failed to remove file {}: {}", path.display(), e))
        })?;
    }
    debug!("Removed {}", path.display());
    Ok(())
}

/// Rename `from` to `to` within the same filesystem, replacing `to` if present
///
/// # Errors
///
/// Returns `SyncError::FileSystem` if the rename fails.
pub async fn rename_entry(from: &Path, to: &Path) -> Result<()> {
    compio::fs::rename(from, to).await.map_err(|e| {
        SyncError::FileSystem(format!(
            "Failed to rename {} to {}: {}",
            from.display(),
            to.display(),
            e
        ))
    })
}

/// Copy one library entry (file or directory) to `dst`
///
/// Directories are replicated with [`replicate_tree`]; plain files go
/// straight through the chunked copier.
///
/// # Errors
///
/// Returns the error of the underlying copy.
pub async fn replicate_entry(src: &Path, dst: &Path) -> Result<TreeStats> {
    if src.is_dir() {
        replicate_tree(src, dst).await
    } else {
        let bytes = copy_file(src, dst).await?;
        Ok(TreeStats {
            files_copied: 1,
            bytes_copied: bytes,
            ..TreeStats::default()
        })
    }
}

/// Recreate the subtree rooted at `src` under `dst`
///
/// Existing destination directories are merged into and existing destination
/// files are overwritten. Failures below the root are collected and the walk
/// carries on; the call fails afterwards if anything was collected.
///
/// # Errors
///
/// Returns `SyncError::FileSystem` if `dst` itself cannot be created and
/// `SyncError::TreeCopyFailed` listing every entry that failed to copy.
pub async fn replicate_tree(src: &Path, dst: &Path) -> Result<TreeStats> {
    let mut stats = TreeStats::default();
    let mut failures = Vec::new();

    info!(
        "Replicating directory {} to {}",
        src.display(),
        dst.display()
    );

    if !dst.exists() {
        compio::fs::create_dir_all(dst).await.map_err(|e| {
            SyncError::FileSystem(format!(
                "Failed to create destination directory {}: {}",
                dst.display(),
                e
            ))
        })?;
        stats.directories_created += 1;
    }

    traverse_and_replicate(src, dst, &mut stats, &mut failures).await;

    if !failures.is_empty() {
        for failure in &failures {
            warn!("Failed to copy {}", failure);
        }
        return Err(SyncError::TreeCopyFailed {
            root: src.to_path_buf(),
            failures,
        });
    }

    info!(
        "Replicated {}: {} files, {} directories, {} bytes",
        src.display(),
        stats.files_copied,
        stats.directories_created,
        stats.bytes_copied
    );
    Ok(stats)
}

#[async_recursion(?Send)]
async fn traverse_and_replicate(
    src: &Path,
    dst: &Path,
    stats: &mut TreeStats,
    failures: &mut Vec<CopyFailure>,
) {
    let names = match list_children(src).await {
        Ok(names) => names,
        Err(e) => {
            failures.push(failure(src, dst, &e));
            return;
        }
    };

    for name in names {
        let src_path = src.join(&name);
        let dst_path = dst.join(&name);

        if src_path.is_dir() {
            if !dst_path.exists() {
                if let Err(e) = compio::fs::create_dir(&dst_path).await {
                    failures.push(failure(&src_path, &dst_path, &e));
                    continue;
                }
                stats.directories_created += 1;
            }
            traverse_and_replicate(&src_path, &dst_path, stats, failures).await;
        } else {
            match copy_file(&src_path, &dst_path).await {
                Ok(bytes) => {
                    stats.files_copied += 1;
                    stats.bytes_copied += bytes;
                }
                Err(e) => failures.push(failure(&src_path, &dst_path, &e)),
            }
        }
    }
}

fn failure(src: &Path, dst: &Path, error: &dyn std::fmt::Display) -> CopyFailure {
    CopyFailure {
        source: PathBuf::from(src),
        destination: PathBuf::from(dst),
        reason: error.to_string(),
    }
}
