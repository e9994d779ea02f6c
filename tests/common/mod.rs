//! Common test helpers for integration tests
//!
//! Tracks are plain text files so the engine can run without binary audio
//! fixtures. The first line holds the sample count, every further line one
//! tag value:
//!
//! ```text
//! SAMPLES=441000
//! TITLE=Intro
//! ARTIST=Band
//! ```
#![allow(dead_code)]

use musync::audio::{has_extension, AudioBackend, TagContainer, TagNames, TagValues};
use musync::error::{Result, SyncError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

const SAMPLES_PREFIX: &str = "SAMPLES=";

/// Text track backend counting how often tags were saved
#[derive(Debug, Clone, Default)]
pub struct TextBackend {
    saves: Arc<AtomicUsize>,
}

impl TextBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`TagContainer::save`] calls on containers from this backend
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct TextTags {
    path: PathBuf,
    samples: u64,
    tags: Vec<(String, String)>,
    saves: Arc<AtomicUsize>,
}

fn parse(path: &Path) -> std::result::Result<(u64, Vec<(String, String)>), String> {
    let body = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut lines = body.lines();
    let samples = lines
        .next()
        .and_then(|line| line.strip_prefix(SAMPLES_PREFIX))
        .and_then(|count| count.parse().ok())
        .ok_or_else(|| "missing sample count".to_string())?;
    let tags = lines
        .filter_map(|line| line.split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    Ok((samples, tags))
}

impl TagContainer for TextTags {
    fn path(&self) -> &Path {
        &self.path
    }

    fn tag_names(&self) -> TagNames {
        self.tags.iter().map(|(name, _)| name.clone()).collect()
    }

    fn get(&self, name: &str) -> Option<TagValues> {
        let values: TagValues = self
            .tags
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .collect();
        (!values.is_empty()).then_some(values)
    }

    fn set(&mut self, name: &str, values: TagValues) {
        self.remove(name);
        for value in values {
            self.tags.push((name.to_string(), value));
        }
    }

    fn remove(&mut self, name: &str) {
        self.tags.retain(|(key, _)| key != name);
    }

    fn save(&mut self) -> Result<()> {
        write_track(&self.path, self.samples, &self.tags)?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl AudioBackend for TextBackend {
    type Container = TextTags;

    fn open(&self, path: &Path) -> Result<TextTags> {
        if !has_extension(path, "flac") {
            return Err(SyncError::UnsupportedFormat(path.display().to_string()));
        }
        let (samples, tags) =
            parse(path).map_err(|e| SyncError::Tag(format!("{}: {}", path.display(), e)))?;
        Ok(TextTags {
            path: path.to_path_buf(),
            samples,
            tags,
            saves: Arc::clone(&self.saves),
        })
    }

    fn sample_count(&self, path: &Path) -> Result<u64> {
        parse(path)
            .map(|(samples, _)| samples)
            .map_err(|reason| SyncError::AudioProbe {
                path: path.to_path_buf(),
                reason,
            })
    }
}

fn write_track(path: &Path, samples: u64, tags: &[(String, String)]) -> Result<()> {
    let mut body = format!("{SAMPLES_PREFIX}{samples}\n");
    for (name, value) in tags {
        body.push_str(&format!("{name}={value}\n"));
    }
    std::fs::write(path, body)?;
    Ok(())
}

/// Write a text track, creating parent directories
pub fn track(path: &Path, samples: u64, tags: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let tags: Vec<(String, String)> = tags
        .iter()
        .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
        .collect();
    write_track(path, samples, &tags).unwrap();
}

/// Write a non-audio file, creating parent directories
pub fn file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Tags of a text track as (name, value) pairs in file order
pub fn tags_of(path: &Path) -> Vec<(String, String)> {
    parse(path).unwrap().1
}

/// Every path under `root`, relative and sorted
pub fn tree(root: &Path) -> Vec<String> {
    let mut paths: Vec<String> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            entry
                .unwrap()
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    paths.sort();
    paths
}
