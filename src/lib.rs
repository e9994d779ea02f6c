//! musync: keep a portable music player in step with a music library
//!
//! The library is the reference hierarchy (`Artist/Album/Track`). A pass
//! deletes artist and album folders the library no longer has, replicates new
//! ones, and reconciles the tags of every track in the albums both sides
//! share. Tracks renamed on the device are found again by their sample count.

pub mod audio;
pub mod cli;
pub mod copy;
pub mod directory;
pub mod error;
pub mod matcher;
pub mod metadata;
pub mod progress;
pub mod sync;

// Re-export commonly used types
pub use audio::{AudioBackend, LoftyBackend, TagContainer};
pub use error::{Result, SyncError};
pub use progress::ProgressTracker;
pub use sync::{sync_library, FailurePolicy, SyncOptions, SyncStats};
