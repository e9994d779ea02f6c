//! Progress tracking and reporting

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner counting reconciled songs
pub struct ProgressTracker {
    progress_bar: ProgressBar,
    songs_checked: u64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} songs {msg}")
        {
            pb.set_style(style);
        }

        Self {
            progress_bar: pb,
            songs_checked: 0,
        }
    }

    /// Show which album is being reconciled
    pub fn set_album(&self, album: &str) {
        self.progress_bar.set_message(album.to_string());
    }

    pub fn song_done(&mut self) {
        self.songs_checked += 1;
        self.progress_bar.inc(1);
    }

    pub const fn songs_checked(&self) -> u64 {
        self.songs_checked
    }

    pub fn finish(&self) {
        self.progress_bar
            .finish_with_message(format!("{} songs checked", self.songs_checked));
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_songs() {
        let mut tracker = ProgressTracker::new();
        tracker.set_album("Artist/Album");
        tracker.song_done();
        tracker.song_done();
        tracker.finish();
        assert_eq!(tracker.songs_checked(), 2);
    }
}
