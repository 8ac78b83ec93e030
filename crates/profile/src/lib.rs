//! Discovery of browser cache directories and the entry files inside them.
//!
//! Supplies file paths to `cache2-entry`; nothing in here understands the
//! entry format.

pub mod error;
mod pattern;

use crate::error::{ErrorKind, Result};
use directories::BaseDirs;
use exn::OptionExt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub use crate::pattern::ProfilePattern;

/// Location of the entry files relative to a profile's cache folder.
pub const ENTRIES_DIR: &str = "cache2/entries";

/// Known cache roots, most likely first.
///
/// - `$XDG_CACHE_HOME/mozilla/firefox` (or `~/.cache/mozilla/firefox`)
/// - `~/Library/Caches/Firefox/Profiles`
/// - `%LOCALAPPDATA%\Mozilla\Firefox\Profiles`
pub fn candidate_roots() -> Vec<PathBuf> {
    match BaseDirs::new() {
        Some(dirs) => candidates(dirs.cache_dir(), dirs.home_dir()),
        None => Vec::new(),
    }
}

fn candidates(cache_dir: &Path, home_dir: &Path) -> Vec<PathBuf> {
    let mut roots = vec![
        cache_dir.join("mozilla/firefox"),
        home_dir.join("Library/Caches/Firefox/Profiles"),
        cache_dir.join("Mozilla/Firefox/Profiles"),
    ];
    roots.dedup();
    roots
}

/// A directory holding one folder per browser profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoot {
    root: PathBuf,
}

impl CacheRoot {
    /// Use an explicit cache root.
    ///
    /// # Errors
    ///
    /// Returns an error if the path doesn't exist or isn't a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let metadata = fs::metadata(&root).map_err(|e| ErrorKind::io(e, &root))?;
        if !metadata.is_dir() {
            exn::bail!(ErrorKind::NotADirectory(root));
        }
        Ok(Self { root })
    }

    /// Use the first of the [`candidate_roots`] that exists.
    #[instrument]
    pub fn discover() -> Result<Self> {
        let root = candidate_roots().into_iter().find(|dir| dir.is_dir()).ok_or_raise(|| ErrorKind::NoCacheRoot)?;
        tracing::debug!(root = %root.display(), "Found cache root");
        Ok(Self { root })
    }

    /// The directory holding the profile folders.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Profile folders matching `pattern`, sorted by name.
    #[instrument(skip(self, pattern), fields(root = %self.root.display(), pattern = pattern.as_str()))]
    pub fn profiles(&self, pattern: &ProfilePattern) -> Result<Vec<PathBuf>> {
        let mut profiles = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| ErrorKind::io(e, &self.root))? {
            let entry = entry.map_err(|e| ErrorKind::io(e, &self.root))?;
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::debug!(path = %path.display(), "Skipping non UTF-8 folder name");
                continue;
            };
            if pattern.matches(&name) && path.is_dir() {
                profiles.push(path);
            }
        }
        profiles.sort();
        Ok(profiles)
    }

    /// The entries folder of the first profile matching `pattern`.
    ///
    /// The folder itself is not required to exist; [`entry_files`] reports
    /// that.
    pub fn entries_dir(&self, pattern: &ProfilePattern) -> Result<PathBuf> {
        let profile = self
            .profiles(pattern)?
            .into_iter()
            .next()
            .ok_or_raise(|| ErrorKind::NoProfile(pattern.as_str().to_string()))?;
        Ok(profile.join(ENTRIES_DIR))
    }
}

/// Regular files in an entries folder, sorted by name.
///
/// Anything that isn't a file (including broken symlinks) is skipped.
#[instrument(skip(dir), fields(dir = %dir.as_ref().display(), files))]
pub fn entry_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| ErrorKind::io(e, dir))? {
        let path = entry.map_err(|e| ErrorKind::io(e, dir))?.path();
        // Follows symlinks.
        if path.is_file() {
            files.push(path);
        } else {
            tracing::trace!(path = %path.display(), "Skipping non-file");
        }
    }
    files.sort();
    tracing::Span::current().record("files", files.len());
    Ok(files)
}
