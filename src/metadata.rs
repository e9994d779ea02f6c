//! Tag reconciliation between a library track and its device copy
//!
//! Two steps, used by the orchestrator in this order:
//!
//! - [`match_metadata`] is the fast path. It assumes both containers already
//!   carry the same tag names and copies every differing value from the
//!   library onto the device. A library tag with no device counterpart makes
//!   it fail with [`SyncError::TagKeyMismatch`] before anything is written.
//! - [`fix_metadata`] repairs the shape of the device tag set: tags the
//!   library lacks are deleted one by one and tags the device lacks are added
//!   with the library's values, so afterwards both hold the same names.
//!
//! Either step saves the device file only when it changed something.

use crate::audio::{TagContainer, TagNames};
use crate::error::{Result, SyncError};
use tracing::{debug, info};

/// Tag names touched by [`fix_metadata`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRepair {
    /// Names deleted from the target because the source lacks them
    pub removed: TagNames,
    /// Names added to the target with the source's values
    pub added: TagNames,
}

impl TagRepair {
    /// True when the target already had the source's tag names
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// Number of tag names deleted or added
    #[must_use]
    pub fn len(&self) -> usize {
        self.removed.len() + self.added.len()
    }
}

/// Make the tag names of `target` equal to those of `source`
///
/// # Errors
///
/// Returns the error of [`TagContainer::save`] if the target could not be
/// written back.
pub fn fix_metadata<S, T>(source: &S, target: &mut T) -> Result<TagRepair>
where
    S: TagContainer + ?Sized,
    T: TagContainer + ?Sized,
{
    let source_names = source.tag_names();
    let target_names = target.tag_names();

    let repair = TagRepair {
        removed: target_names.difference(&source_names).cloned().collect(),
        added: source_names.difference(&target_names).cloned().collect(),
    };

    for name in &repair.removed {
        debug!("Removing tag {} from {}", name, target.path().display());
        target.remove(name);
    }
    for name in &repair.added {
        if let Some(values) = source.get(name) {
            debug!("Adding tag {} to {}", name, target.path().display());
            target.set(name, values);
        }
    }

    if !repair.is_empty() {
        target.save()?;
        info!(
            "Repaired tag set of {}: {} removed, {} added",
            target.path().display(),
            repair.removed.len(),
            repair.added.len()
        );
    }
    Ok(repair)
}

/// Copy every differing tag value of `source` onto `target`
///
/// # Returns
///
/// The number of tags whose value changed. Zero means the pair already
/// matched and the target was not written.
///
/// # Errors
///
/// Returns `SyncError::TagKeyMismatch` if `source` carries a tag that
/// `target` lacks; the target is left untouched in that case. Errors from
/// [`TagContainer::save`] are passed through.
pub fn match_metadata<S, T>(source: &S, target: &mut T) -> Result<usize>
where
    S: TagContainer + ?Sized,
    T: TagContainer + ?Sized,
{
    let mut updates = Vec::new();
    for name in source.tag_names() {
        let wanted = source.get(&name).unwrap_or_default();
        match target.get(&name) {
            None => {
                return Err(SyncError::TagKeyMismatch {
                    path: target.path().to_path_buf(),
                    tag: name,
                })
            }
            Some(current) if current != wanted => updates.push((name, wanted)),
            Some(_) => {}
        }
    }

    if updates.is_empty() {
        return Ok(0);
    }

    for (name, values) in &updates {
        info!(
            "Tag {} of {} differs, now {:?}",
            name,
            target.path().display(),
            values
        );
        target.set(name, values.clone());
    }
    target.save()?;
    Ok(updates.len())
}
