//! Audio container access
//!
//! The reconciliation engine never touches an audio format directly. It works
//! through two seams:
//!
//! - [`AudioBackend`] opens a track's tag container and reads the total
//!   sample count from its stream info;
//! - [`TagContainer`] enumerates, reads, writes and deletes tags by name and
//!   persists the result.
//!
//! [`LoftyBackend`] is the production backend. Tags are FLAC Vorbis comments
//! read and written with `lofty`. Arbitrary field names, multi-valued fields
//! and embedded cover art survive a rewrite. Sample counts come from
//! `symphonia`'s probe of the stream header, so they are available for any
//! format symphonia knows.

use crate::error::{Result, SyncError};
use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::AudioFile;
use lofty::flac::FlacFile;
use lofty::ogg::{OggPictureStorage, VorbisComments};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Values of one tag; Vorbis comments allow a field to repeat
pub type TagValues = Vec<String>;

/// Set of tag names carried by a container
pub type TagNames = BTreeSet<String>;

/// Named metadata fields of one audio file
pub trait TagContainer {
    /// File this container was read from and saves to
    fn path(&self) -> &Path;

    /// Every tag name present
    fn tag_names(&self) -> TagNames;

    /// Values of `name`, or `None` if the tag is absent
    fn get(&self, name: &str) -> Option<TagValues>;

    /// Replace all values of `name`
    fn set(&mut self, name: &str, values: TagValues);

    /// Delete `name` and all its values
    fn remove(&mut self, name: &str);

    /// Write the tags back to [`TagContainer::path`]
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Tag` if the file cannot be rewritten.
    fn save(&mut self) -> Result<()>;
}

/// Access to audio files on disk
pub trait AudioBackend {
    /// Tag container produced by [`AudioBackend::open`]
    type Container: TagContainer;

    /// Read the tags of the file at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or of a format
    /// this backend cannot tag.
    fn open(&self, path: &Path) -> Result<Self::Container>;

    /// Total number of decoded samples per channel in the file's audio stream
    ///
    /// # Errors
    ///
    /// Returns `SyncError::AudioProbe` if the stream header cannot be read or
    /// does not state its length.
    fn sample_count(&self, path: &Path) -> Result<u64>;
}

/// Whether `path` carries the audio `extension`, compared without case
#[must_use]
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// FLAC tags via lofty, stream info via symphonia
#[derive(Debug, Clone)]
pub struct LoftyBackend {
    parse_options: ParseOptions,
}

impl Default for LoftyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LoftyBackend {
    /// Create a backend that reads tags and cover art but not stream properties
    #[must_use]
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new().read_properties(false),
        }
    }
}

/// Metadata blocks of one FLAC file
///
/// The whole parsed file is kept so that its PICTURE blocks are written back
/// next to the edited Vorbis comments on save.
pub struct FlacTags {
    path: PathBuf,
    file: FlacFile,
}

impl FlacTags {
    /// Number of PICTURE blocks carried by the file
    #[must_use]
    pub fn picture_count(&self) -> usize {
        self.file.pictures().len()
    }
}

impl TagContainer for FlacTags {
    fn path(&self) -> &Path {
        &self.path
    }

    fn tag_names(&self) -> TagNames {
        // Vorbis field names are case-insensitive
        self.file
            .vorbis_comments()
            .map(|comments| {
                comments
                    .items()
                    .map(|(key, _)| key.to_ascii_uppercase())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get(&self, name: &str) -> Option<TagValues> {
        let values: TagValues = self
            .file
            .vorbis_comments()?
            .get_all(name)
            .map(str::to_owned)
            .collect();
        (!values.is_empty()).then_some(values)
    }

    fn set(&mut self, name: &str, values: TagValues) {
        match self.file.vorbis_comments_mut() {
            Some(comments) => {
                comments.remove(name).for_each(drop);
                for value in values {
                    comments.push(name.to_owned(), value);
                }
            }
            None => {
                let mut comments = VorbisComments::default();
                for value in values {
                    comments.push(name.to_owned(), value);
                }
                self.file.set_vorbis_comments(comments);
            }
        }
    }

    fn remove(&mut self, name: &str) {
        if let Some(comments) = self.file.vorbis_comments_mut() {
            comments.remove(name).for_each(drop);
        }
    }

    fn save(&mut self) -> Result<()> {
        self.file
            .save_to_path(&self.path, WriteOptions::default())
            .map_err(|e| {
                SyncError::Tag(format!("Failed to save tags to {}: {}", self.path.display(), e))
            })?;
        debug!(
            "Saved tags and {} pictures to {}",
            self.picture_count(),
            self.path.display()
        );
        Ok(())
    }
}

impl AudioBackend for LoftyBackend {
    type Container = FlacTags;

    fn open(&self, path: &Path) -> Result<FlacTags> {
        if !has_extension(path, "flac") {
            return Err(SyncError::UnsupportedFormat(format!(
                "{} is not a FLAC file",
                path.display()
            )));
        }

        let mut file = std::fs::File::open(path).map_err(|e| {
            SyncError::Tag(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let flac = FlacFile::read_from(&mut file, self.parse_options)
            .map_err(|e| SyncError::Tag(format!("Failed to parse {}: {}", path.display(), e)))?;

        Ok(FlacTags {
            path: path.to_path_buf(),
            file: flac,
        })
    }

    fn sample_count(&self, path: &Path) -> Result<u64> {
        let probe_error = |reason: String| SyncError::AudioProbe {
            path: path.to_path_buf(),
            reason,
        };

        let file = std::fs::File::open(path).map_err(|e| probe_error(e.to_string()))?;
        let media_source = Box::new(file) as Box<dyn MediaSource>;
        let stream = MediaSourceStream::new(media_source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| probe_error(format!("Failed to probe format: {e}")))?;

        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| probe_error("No audio track".to_string()))?;

        track
            .codec_params
            .n_frames
            .ok_or_else(|| probe_error("Stream does not state its length".to_string()))
    }
}
