//! User preferences persistence with file locking.
//!
//! Preferences remember what the user last chose so a bare `stride run`
//! can repeat it. Writes are atomic; unreadable files fall back to defaults.

use crate::{Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Last quick-start parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QuickStartPrefs {
    pub minutes: u32,
    pub speed: f64,
}

impl Default for QuickStartPrefs {
    fn default() -> Self {
        Self {
            minutes: 20,
            speed: 2.5,
        }
    }
}

/// Preferences carried between runs
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Prefs {
    #[serde(default)]
    pub quick_start: QuickStartPrefs,
    #[serde(default)]
    pub last_preset_id: Option<String>,
}

impl Prefs {
    /// Load preferences with shared locking
    ///
    /// Returns defaults if the file is missing or corrupted.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No prefs file found, using defaults");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open prefs {:?}: {}. Using defaults.", path, e);
                return Ok(Self::default());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock prefs {:?}: {}. Using defaults.", path, e);
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        let _ = file.unlock();
        if let Err(e) = read {
            tracing::warn!("Failed to read prefs {:?}: {}. Using defaults.", path, e);
            return Ok(Self::default());
        }

        match serde_json::from_str::<Prefs>(&contents) {
            Ok(prefs) => {
                tracing::debug!("Loaded prefs from {:?}", path);
                Ok(prefs)
            }
            Err(e) => {
                tracing::warn!("Failed to parse prefs {:?}: {}. Using defaults.", path, e);
                Ok(Self::default())
            }
        }
    }

    /// Save preferences atomically (temp file, fsync, rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Other(format!("prefs path {:?} has no parent", path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved prefs to {:?}", path);
        Ok(())
    }

    /// Load, modify, and save back
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut Prefs),
    {
        let mut prefs = Self::load(path)?;
        f(&mut prefs);
        prefs.save(path)?;
        Ok(prefs)
    }
}
