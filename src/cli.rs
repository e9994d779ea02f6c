//! Command-line interface definitions

use crate::matcher::DEFAULT_SIMILARITY_THRESHOLD;
use crate::sync::{FailurePolicy, SyncOptions};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Mirror a music library onto a portable device, repairing tags and names
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Args {
    /// Library root, laid out as Artist/Album/Track (positional or --library)
    #[arg(value_name = "LIBRARY")]
    pub library_positional: Option<PathBuf>,

    /// Device root, same layout as the library (positional or --device)
    #[arg(value_name = "DEVICE")]
    pub device_positional: Option<PathBuf>,

    /// Library root (alternative to positional arg)
    #[arg(short, long, conflicts_with = "library_positional")]
    pub library: Option<PathBuf>,

    /// Device root (alternative to positional arg)
    #[arg(short, long, conflicts_with = "device_positional")]
    pub device: Option<PathBuf>,

    /// Extension of the tracks whose tags are reconciled
    #[arg(long, default_value = "flac")]
    pub extension: String,

    /// Minimum name similarity (0.0 to 1.0) for picking among tracks of equal length
    ///
    /// Only used when several device files share a library track's sample
    /// count. The best-scoring name must score strictly above this value,
    /// otherwise the library track is copied in as a new file.
    #[arg(long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    pub similarity_threshold: f64,

    /// What to do with a track that cannot be reconciled
    #[arg(long, value_enum, default_value = "abort")]
    pub on_error: OnError,

    /// Only sync artist and album folders, leave tracks untouched
    #[arg(long)]
    pub folders_only: bool,

    /// Show progress information
    #[arg(long)]
    pub progress: bool,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Reaction to an unrecoverable track
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OnError {
    /// Stop at the first failure
    Abort,
    /// Log the failure and continue with the next track
    Skip,
}

impl From<OnError> for FailurePolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => Self::Abort,
            OnError::Skip => Self::Skip,
        }
    }
}

impl Args {
    /// Get the library root (from positional or flag)
    ///
    /// # Errors
    ///
    /// Returns an error if the library is not specified
    pub fn get_library(&self) -> Result<PathBuf> {
        self.library_positional
            .clone()
            .or_else(|| self.library.clone())
            .ok_or_else(|| anyhow::anyhow!("Library must be specified (positional or --library)"))
    }

    /// Get the device root (from positional or flag)
    ///
    /// # Errors
    ///
    /// Returns an error if the device is not specified
    pub fn get_device(&self) -> Result<PathBuf> {
        self.device_positional
            .clone()
            .or_else(|| self.device.clone())
            .ok_or_else(|| anyhow::anyhow!("Device must be specified (positional or --device)"))
    }

    /// Validate command-line arguments
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - Library or device not specified
    /// - Library or device is not an existing directory
    /// - Library and device are the same directory
    /// - Similarity threshold is outside 0.0 to 1.0
    /// - Extension is empty
    /// - Both --quiet and --verbose options are used
    pub fn validate(&self) -> Result<()> {
        let library = self.get_library()?;
        let device = self.get_device()?;

        for (role, path) in [("Library", &library), ("Device", &device)] {
            if !path.exists() {
                anyhow::bail!("{} path does not exist: {}", role, path.display());
            }
            if !path.is_dir() {
                anyhow::bail!("{} path must be a directory: {}", role, path.display());
            }
        }

        if library.canonicalize()? == device.canonicalize()? {
            anyhow::bail!("Library and device must be different directories");
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            anyhow::bail!(
                "Similarity threshold must be between 0.0 and 1.0, got: {}",
                self.similarity_threshold
            );
        }

        if self.extension.trim_start_matches('.').is_empty() {
            anyhow::bail!("Extension must not be empty");
        }

        if self.quiet && self.verbose > 0 {
            anyhow::bail!("Cannot use both --quiet and --verbose options");
        }

        Ok(())
    }

    /// Build the engine options from the parsed arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the library or device is not specified
    pub fn to_options(&self) -> Result<SyncOptions> {
        Ok(SyncOptions {
            extension: self.extension.trim_start_matches('.').to_string(),
            similarity_threshold: self.similarity_threshold,
            on_failure: self.on_error.into(),
            folders_only: self.folders_only,
            show_progress: self.progress && !self.quiet,
            ..SyncOptions::new(self.get_library()?, self.get_device()?)
        })
    }

    #[cfg(test)]
    pub(crate) fn test_default(library: PathBuf, device: PathBuf) -> Self {
        Self {
            library_positional: None,
            device_positional: None,
            library: Some(library),
            device: Some(device),
            extension: "flac".to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            on_error: OnError::Abort,
            folders_only: false,
            progress: false,
            verbose: 0,
            quiet: false,
        }
    }
}
