//! Main synchronization logic
//!
//! This module drives a whole pass over the library and the device. The pass
//! walks the hierarchy top-down in fixed phases:
//!
//! 1. **Root**: diff the artist folders, delete stale ones from the device,
//!    then replicate new ones from the library. Deletions always run first.
//! 2. **Artists**: the same diff/delete/replicate one level down, for every
//!    artist that already existed on the device.
//! 3. **Albums / Songs**: for every pre-existing album, reconcile each library
//!    track with its device copy, then bring the album's remaining entries
//!    (cover art, stale files) in line with the library.
//!
//! Freshly replicated folders are skipped by later phases since they are
//! byte-for-byte copies of the library.
//!
//! # Song reconciliation
//!
//! Each track first goes through [`match_metadata`]. If that fails with a
//! repairable error (a tag missing on the device copy, or no device file under
//! the library name) the track is re-matched with [`SongMatcher`], its tag set
//! is repaired with [`fix_metadata`] and the match is retried once. Anything
//! else, or a failed retry, is an unrecoverable song which aborts the run
//! under [`FailurePolicy::Abort`] or is counted and skipped under
//! [`FailurePolicy::Skip`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use musync::audio::LoftyBackend;
//! use musync::sync::{sync_library, SyncOptions};
//!
//! #[compio::main]
//! async fn main() -> musync::Result<()> {
//!     let options = SyncOptions::new("/music".into(), "/media/player/Music".into());
//!     let stats = sync_library(&options, &LoftyBackend::new()).await?;
//!     println!("{stats}");
//!     Ok(())
//! }
//! ```

use crate::audio::{has_extension, AudioBackend};
use crate::directory::{diff_children, list_children, remove_entry, replicate_entry, ChildSet};
use crate::error::{Result, SyncError};
use crate::matcher::{MatchOutcome, SongMatcher, DEFAULT_SIMILARITY_THRESHOLD};
use crate::metadata::{fix_metadata, match_metadata};
use crate::progress::ProgressTracker;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What to do when a song cannot be reconciled even after repairing it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the whole run at the first unrecoverable song
    #[default]
    Abort,
    /// Log the song, count it as skipped and carry on
    Skip,
}

/// Settings for one pass
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Root of the reference hierarchy
    pub library: PathBuf,
    /// Root of the mirrored hierarchy
    pub device: PathBuf,
    /// Extension of the tracks to reconcile, compared without case
    pub extension: String,
    /// Fuzzy name matches must score strictly above this (0.0 to 1.0)
    pub similarity_threshold: f64,
    /// Reaction to an unrecoverable song
    pub on_failure: FailurePolicy,
    /// Only sync the artist and album folders, leave songs alone
    pub folders_only: bool,
    /// Show a spinner while songs are reconciled
    pub show_progress: bool,
}

impl SyncOptions {
    /// Defaults: FLAC tracks, 0.8 threshold, abort on failure
    #[must_use]
    pub fn new(library: PathBuf, device: PathBuf) -> Self {
        Self {
            library,
            device,
            extension: "flac".to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            on_failure: FailurePolicy::Abort,
            folders_only: false,
            show_progress: false,
        }
    }
}

/// Phases of a pass, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncPhase {
    Root,
    Artists,
    Albums,
    Songs,
    Done,
}

/// Counters accumulated over one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Artist and album entries replicated from the library
    pub folders_added: u64,
    /// Artist and album entries deleted from the device
    pub folders_removed: u64,
    /// Tags whose value was changed, added or removed on the device
    pub tags_changed: u64,
    /// Files written by replication, matching fallback or album tail sync
    pub files_copied: u64,
    /// Device files renamed to their library name
    pub files_renamed: u64,
    /// Stale files deleted from device albums
    pub files_removed: u64,
    /// Library tracks looked at
    pub songs_checked: u64,
    /// Tracks that needed the repair path
    pub songs_repaired: u64,
    /// Tracks left unreconciled under [`FailurePolicy::Skip`]
    pub songs_skipped: u64,
    /// Bytes written to the device
    pub bytes_copied: u64,
    /// Wall time of the pass
    pub duration: Duration,
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sync complete. {} folders removed, {} folders added and {} tags changed",
            self.folders_removed, self.folders_added, self.tags_changed
        )
    }
}

/// Run one full pass bringing `options.device` in line with `options.library`
///
/// # Errors
///
/// This function will return an error if:
/// - either root is not an existing directory, or both are the same path
/// - a folder cannot be listed, removed or replicated
/// - a song is unrecoverable and the policy is [`FailurePolicy::Abort`]
#[allow(clippy::future_not_send)]
pub async fn sync_library<B: AudioBackend>(options: &SyncOptions, backend: &B) -> Result<SyncStats> {
    for (role, root) in [("Library", &options.library), ("Device", &options.device)] {
        if !root.is_dir() {
            return Err(SyncError::InvalidConfig(format!(
                "{} root is not a directory: {}",
                role,
                root.display()
            )));
        }
    }
    if options.library == options.device {
        return Err(SyncError::InvalidConfig(
            "Library and device must be different directories".to_string(),
        ));
    }

    info!(
        "Starting synchronization from {} to {}",
        options.library.display(),
        options.device.display()
    );
    Synchronizer::new(options, backend).run().await
}

struct Synchronizer<'a, B: AudioBackend> {
    options: &'a SyncOptions,
    backend: &'a B,
    matcher: SongMatcher<'a, B>,
    stats: SyncStats,
    phase: SyncPhase,
    progress: Option<ProgressTracker>,
}

impl<'a, B: AudioBackend> Synchronizer<'a, B> {
    fn new(options: &'a SyncOptions, backend: &'a B) -> Self {
        Self {
            options,
            backend,
            matcher: SongMatcher::new(backend, options.similarity_threshold),
            stats: SyncStats::default(),
            phase: SyncPhase::Root,
            progress: options.show_progress.then(ProgressTracker::new),
        }
    }

    fn enter(&mut self, phase: SyncPhase) {
        debug!("Phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    async fn run(mut self) -> Result<SyncStats> {
        let start_time = Instant::now();
        let options = self.options;
        let (library, device) = (&options.library, &options.device);

        self.enter(SyncPhase::Root);
        let fresh_artists = self.sync_level(library, device).await?;

        self.enter(SyncPhase::Artists);
        let mut artists = Vec::new();
        for artist in existing_dirs(library, &fresh_artists).await? {
            let fresh_albums = self
                .sync_level(&library.join(&artist), &device.join(&artist))
                .await?;
            artists.push((artist, fresh_albums));
        }

        self.enter(SyncPhase::Albums);
        let mut albums = Vec::new();
        for (artist, fresh_albums) in &artists {
            let lib_artist = library.join(artist);
            let dev_artist = device.join(artist);
            for album in existing_dirs(&lib_artist, fresh_albums).await? {
                albums.push((lib_artist.join(&album), dev_artist.join(&album)));
            }
        }
        debug!("{} albums to reconcile", albums.len());

        if self.options.folders_only {
            info!("Folder sync only, skipping {} albums", albums.len());
        } else {
            self.enter(SyncPhase::Songs);
            for (lib_album, dev_album) in &albums {
                self.reconcile_album(lib_album, dev_album).await?;
            }
        }

        self.enter(SyncPhase::Done);
        if let Some(progress) = &self.progress {
            progress.finish();
        }
        self.stats.duration = start_time.elapsed();
        info!("Synchronization completed in {:?}", self.stats.duration);
        info!(
            "Folders removed: {}, folders added: {}, tags changed: {}",
            self.stats.folders_removed, self.stats.folders_added, self.stats.tags_changed
        );
        Ok(self.stats)
    }

    /// Diff one directory level, delete stale entries, then replicate new ones
    ///
    /// Returns the names that were replicated.
    async fn sync_level(&mut self, source: &Path, target: &Path) -> Result<ChildSet> {
        let mut diff = diff_children(source, target).await?;

        // A folder on one side and a file on the other is replaced wholesale
        let mismatched: ChildSet = list_children(source)
            .await?
            .into_iter()
            .filter(|name| !diff.added.contains(name))
            .filter(|name| source.join(name).is_dir() != target.join(name).is_dir())
            .collect();
        for name in mismatched {
            warn!("{} changed kind, replacing it", target.join(&name).display());
            diff.removed.insert(name.clone());
            diff.added.insert(name);
        }

        for name in &diff.removed {
            remove_entry(&target.join(name)).await?;
            self.stats.folders_removed += 1;
            info!("Removed stale {}", target.join(name).display());
        }
        for name in &diff.added {
            let tree = replicate_entry(&source.join(name), &target.join(name)).await?;
            self.stats.folders_added += 1;
            self.stats.files_copied += tree.files_copied;
            self.stats.bytes_copied += tree.bytes_copied;
            info!("Added {}", target.join(name).display());
        }
        Ok(diff.added)
    }

    async fn reconcile_album(&mut self, lib_album: &Path, dev_album: &Path) -> Result<()> {
        debug!("Reconciling album {}", lib_album.display());
        if let Some(progress) = &self.progress {
            progress.set_album(&lib_album.display().to_string());
        }

        let songs: ChildSet = list_children(lib_album)
            .await?
            .into_iter()
            .filter(|name| {
                let path = lib_album.join(name);
                path.is_file() && has_extension(&path, &self.options.extension)
            })
            .collect();

        for song in &songs {
            self.reconcile_song(&lib_album.join(song), dev_album, &songs)
                .await?;
            if let Some(progress) = &mut self.progress {
                progress.song_done();
            }
        }

        // Whatever is left over: cover art and playlists to add, strays to drop
        let diff = diff_children(lib_album, dev_album).await?;
        for name in &diff.removed {
            remove_entry(&dev_album.join(name)).await?;
            self.stats.files_removed += 1;
            info!("Removed stale {}", dev_album.join(name).display());
        }
        for name in &diff.added {
            let tree = replicate_entry(&lib_album.join(name), &dev_album.join(name)).await?;
            self.stats.files_copied += tree.files_copied;
            self.stats.bytes_copied += tree.bytes_copied;
            info!("Added {}", dev_album.join(name).display());
        }
        Ok(())
    }

    async fn reconcile_song(
        &mut self,
        lib_song: &Path,
        dev_album: &Path,
        album_songs: &ChildSet,
    ) -> Result<()> {
        self.stats.songs_checked += 1;
        let dev_song = match lib_song.file_name() {
            Some(name) => dev_album.join(name),
            None => {
                return Err(SyncError::FileSystem(format!(
                    "Invalid file name in {}",
                    lib_song.display()
                )))
            }
        };

        let result = match self.match_song(lib_song, &dev_song) {
            Err(e) if e.is_repairable() => {
                warn!("{}, repairing {}", e, dev_song.display());
                self.repair_song(lib_song, dev_album, &dev_song, album_songs)
                    .await
            }
            other => other,
        };

        match result {
            Ok(changed) => {
                self.stats.tags_changed += changed as u64;
                Ok(())
            }
            Err(e) => {
                let err = SyncError::UnrecoverableSong {
                    path: lib_song.to_path_buf(),
                    source: Box::new(e),
                };
                match self.options.on_failure {
                    FailurePolicy::Abort => {
                        error!("{}", err);
                        Err(err)
                    }
                    FailurePolicy::Skip => {
                        error!("{}, skipping", err);
                        self.stats.songs_skipped += 1;
                        Ok(())
                    }
                }
            }
        }
    }

    fn match_song(&self, lib_song: &Path, dev_song: &Path) -> Result<usize> {
        if !dev_song.is_file() {
            return Err(SyncError::MissingTarget(dev_song.to_path_buf()));
        }
        let source = self.backend.open(lib_song)?;
        let mut target = self.backend.open(dev_song)?;
        match_metadata(&source, &mut target)
    }

    /// Re-establish the device copy, align its tag names and match once more
    ///
    /// Returns the number of tags added, removed or changed on the device.
    async fn repair_song(
        &mut self,
        lib_song: &Path,
        dev_album: &Path,
        dev_song: &Path,
        album_songs: &ChildSet,
    ) -> Result<usize> {
        let outcome = self.matcher.resolve(lib_song, dev_album, album_songs).await?;
        match outcome {
            MatchOutcome::AlreadyInPlace => {}
            MatchOutcome::Renamed { .. } => self.stats.files_renamed += 1,
            MatchOutcome::Copied { bytes } => {
                self.stats.files_copied += 1;
                self.stats.bytes_copied += bytes;
            }
        }

        let source = self.backend.open(lib_song)?;
        let mut target = self.backend.open(dev_song)?;
        let repair = fix_metadata(&source, &mut target)?;

        let changed = self.match_song(lib_song, dev_song)?;
        self.stats.songs_repaired += 1;
        Ok(repair.len() + changed)
    }
}

/// Directories under `parent` that were not just replicated
async fn existing_dirs(parent: &Path, fresh: &ChildSet) -> Result<Vec<String>> {
    Ok(list_children(parent)
        .await?
        .into_iter()
        .filter(|name| !fresh.contains(name) && parent.join(name).is_dir())
        .collect())
}
