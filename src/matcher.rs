//! Identity resolution for tracks whose device name has drifted
//!
//! When a library track has no usable counterpart under the same name on the
//! device, [`SongMatcher::resolve`] looks for it by content. The total sample
//! count of the audio stream survives re-encoding (without resampling) and
//! retagging, so device files sharing the library track's count are the
//! candidates:
//!
//! - no candidate: the library file is copied in under its own name;
//! - one candidate: it is renamed to the library file's name;
//! - several: the candidate whose name is most similar to the library name
//!   wins if its similarity is strictly above the threshold, otherwise the
//!   library file is copied in as a new file.
//!
//! Similarity is `strsim::normalized_levenshtein`, on a 0.0 to 1.0 scale where
//! identical names score 1.0.

use crate::audio::AudioBackend;
use crate::copy::copy_file;
use crate::directory::{list_children, rename_entry};
use crate::error::{Result, SyncError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default cutoff for accepting a fuzzy name match
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Normalized similarity of two file names, 1.0 for identical names
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// A device file sharing the library track's sample count
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    /// Full path on the device
    pub path: PathBuf,
    /// File name on the device
    pub name: String,
    /// Similarity of `name` to the library file name
    pub score: f64,
}

/// What [`SongMatcher::resolve`] did to the device directory
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// The device file already carries the library name
    AlreadyInPlace,
    /// A device file was renamed to the library name
    Renamed {
        /// Previous device path
        from: PathBuf,
    },
    /// The library file was copied onto the device
    Copied {
        /// Bytes written
        bytes: u64,
    },
}

/// Finds or creates the device counterpart of a library track
#[derive(Debug)]
pub struct SongMatcher<'a, B: AudioBackend> {
    backend: &'a B,
    threshold: f64,
}

impl<'a, B: AudioBackend> SongMatcher<'a, B> {
    /// Create a matcher accepting fuzzy matches scoring above `threshold`
    #[must_use]
    pub const fn new(backend: &'a B, threshold: f64) -> Self {
        Self { backend, threshold }
    }

    /// Make sure `target_dir` holds the counterpart of `source` under the
    /// source's file name
    ///
    /// Files named in `claimed` belong to other library tracks and are never
    /// considered, so a rename cannot steal another track's device copy. The
    /// source's own name is always eligible.
    ///
    /// # Errors
    ///
    /// Returns an error if the source's sample count cannot be read, the
    /// target directory cannot be listed, or the rename/copy fails.
    #[allow(clippy::future_not_send)]
    pub async fn resolve(
        &self,
        source: &Path,
        target_dir: &Path,
        claimed: &BTreeSet<String>,
    ) -> Result<MatchOutcome> {
        let source_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                SyncError::FileSystem(format!("Invalid file name in {}", source.display()))
            })?
            .to_string();
        let destination = target_dir.join(&source_name);

        let wanted = self.backend.sample_count(source)?;
        let candidates = self
            .candidates(target_dir, &source_name, wanted, claimed)
            .await?;
        debug!(
            "{} candidates for {} ({} samples)",
            candidates.len(),
            source.display(),
            wanted
        );

        let chosen = match candidates.as_slice() {
            [] => None,
            [only] => Some(only),
            several => several
                .iter()
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .filter(|best| best.score > self.threshold),
        };

        match chosen {
            Some(candidate) if candidate.name == source_name => Ok(MatchOutcome::AlreadyInPlace),
            Some(candidate) => {
                if destination.exists() {
                    warn!(
                        "Replacing {} with {}, its stream length does not match",
                        destination.display(),
                        candidate.path.display()
                    );
                }
                rename_entry(&candidate.path, &destination).await?;
                info!(
                    "Renamed {} to {}",
                    candidate.path.display(),
                    destination.display()
                );
                Ok(MatchOutcome::Renamed {
                    from: candidate.path.clone(),
                })
            }
            None => {
                let bytes = copy_file(source, &destination).await?;
                info!("Copied {} to {}", source.display(), destination.display());
                Ok(MatchOutcome::Copied { bytes })
            }
        }
    }

    async fn candidates(
        &self,
        target_dir: &Path,
        source_name: &str,
        wanted: u64,
        claimed: &BTreeSet<String>,
    ) -> Result<Vec<MatchCandidate>> {
        let mut candidates = Vec::new();
        for name in list_children(target_dir).await? {
            if name != source_name && claimed.contains(&name) {
                continue;
            }
            let path = target_dir.join(&name);
            if !path.is_file() {
                continue;
            }
            match self.backend.sample_count(&path) {
                Ok(count) if count == wanted => {
                    let score = similarity(&name, source_name);
                    candidates.push(MatchCandidate { path, name, score });
                }
                Ok(_) => {}
                Err(e) => debug!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(candidates)
    }
}
