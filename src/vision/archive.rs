//! Per-day archive of captured box photos
//!
//! Layout is `<root>/<day>/<medication>.jpg`. The day's directory is emptied
//! at the start of every round; recaps attach whatever it holds.

use std::path::{Path, PathBuf};

use super::Frame;
use crate::Result;

#[derive(Debug, Clone)]
pub struct PhotoArchive {
    root: PathBuf,
}

impl PhotoArchive {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn day_dir(&self, day: &str) -> PathBuf {
        self.root.join(day)
    }

    /// Remove every photo stored for `day`
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be removed or recreated
    pub async fn clear_day(&self, day: &str) -> Result<()> {
        let dir = self.day_dir(day);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(day, "photo archive cleared");
        Ok(())
    }

    /// Store the last frame shown for `medication`, replacing earlier attempts
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub async fn store(&self, day: &str, medication: &str, frame: &Frame) -> Result<PathBuf> {
        let dir = self.day_dir(day);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.jpg", file_stem(medication)));
        tokio::fs::write(&path, &frame.bytes).await?;
        tracing::debug!(path = %path.display(), "photo stored");
        Ok(path)
    }

    /// Photos stored for `day` as `(medication, path)`, sorted by name
    ///
    /// # Errors
    ///
    /// Returns error if the directory exists but cannot be read
    pub async fn list(&self, day: &str) -> Result<Vec<(String, PathBuf)>> {
        let dir = self.day_dir(day);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut photos = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jpg")
                && let Some(stem) = path.file_stem()
            {
                photos.push((stem.to_string_lossy().into_owned(), path));
            }
        }
        photos.sort();
        Ok(photos)
    }
}

/// Medication name usable as a file name
fn file_stem(medication: &str) -> String {
    let stem: String = medication
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    if stem.is_empty() || stem.starts_with('.') {
        format!("_{stem}")
    } else {
        stem
    }
}
