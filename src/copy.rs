//! Chunked file copying
//!
//! Streams a single file from the library to the device in fixed 1 MiB blocks
//! using compio's positional `read_at`/`write_all_at` operations. Both files are
//! owned handles scoped to [`copy_file`], so they are closed on every exit path,
//! including an early return after a failed read or write.
//!
//! A failed copy may leave a truncated destination behind. Callers treat a copy
//! as all-or-nothing for the current pass and do not verify the result.
//!
//! # Usage
//!
//! ```rust,ignore
//! use musync::copy::copy_file;
//!
//! let bytes = copy_file(src_path, dst_path).await?;
//! ```

use crate::error::{Result, SyncError};
use compio::fs::{File, OpenOptions};
use compio::io::{AsyncReadAt, AsyncWriteAtExt};
use std::path::Path;

/// Size of every block moved from source to destination
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Copy `src` over `dst`, creating or truncating `dst`
///
/// # Returns
///
/// The number of bytes written to `dst`.
///
/// # Errors
///
/// Returns `SyncError::FileSystem` if the source cannot be opened or the
/// destination cannot be created, and `SyncError::CopyFailed` if a block
/// read or write fails part way through.
#[allow(clippy::future_not_send)]
pub async fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    let src_file = File::open(src).await.map_err(|e| {
        SyncError::FileSystem(format!(
            "Failed to open source file {}: {}",
            src.display(),
            e
        ))
    })?;

    let mut dst_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dst)
        .await
        .map_err(|e| {
            SyncError::FileSystem(format!(
                "Failed to open destination file {}: {}",
                dst.display(),
                e
            ))
        })?;

    let mut offset = 0u64;
    let mut buffer: Vec<u8> = Vec::with_capacity(BLOCK_SIZE);

    loop {
        buffer.clear();
        let read = src_file.read_at(buffer, offset).await;
        buffer = read.1;
        let bytes_read = read.0.map_err(|e| {
            SyncError::CopyFailed(format!(
                "read of {} at offset {} failed: {}",
                src.display(),
                offset,
                e
            ))
        })?;

        if bytes_read == 0 {
            break;
        }

        let written = dst_file.write_all_at(buffer, offset).await;
        buffer = written.1;
        written.0.map_err(|e| {
            SyncError::CopyFailed(format!(
                "write to {} at offset {} failed: {}",
                dst.display(),
                offset,
                e
            ))
        })?;

        offset += bytes_read as u64;
        tracing::trace!("copied block of {} bytes, total {}", bytes_read, offset);
    }

    dst_file
        .sync_all()
        .await
        .map_err(|e| SyncError::FileSystem(format!("Failed to sync destination file: {e}")))?;

    tracing::debug!(
        "copied {} bytes from {} to {}",
        offset,
        src.display(),
        dst.display()
    );
    Ok(offset)
}
