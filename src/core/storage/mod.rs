//! Filesystem-backed key-value storage for chat histories.
//!
//! Keys are `/`-separated paths; each maps to one JSON file under the root,
//! e.g. `worldchat/skyfall/display` → `<root>/worldchat/skyfall/display.json`.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use chat_core::StorageError;
use chat_core::persistence::{KeyValueStore, Result};

use crate::config::Config;

/// Storage backend for persisting data.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store at the configured location.
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be determined.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::with_root(config.storage_dir()?))
    }

    /// Create a storage instance at a custom location.
    #[must_use]
    pub const fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the storage root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Split a key into path segments, rejecting anything that would leave
    /// the root.
    fn segments(key: &str) -> Result<Vec<&str>> {
        key.split('/')
            .map(|segment| {
                let valid = !segment.is_empty()
                    && segment != "."
                    && segment != ".."
                    && !segment.contains(['\\', '\0']);
                if valid {
                    Ok(segment)
                } else {
                    Err(StorageError::InvalidKey(key.to_string()))
                }
            })
            .collect()
    }

    /// Directory for a key prefix.
    fn dir(&self, prefix: &str) -> Result<PathBuf> {
        let mut dir = self.root.clone();
        dir.extend(Self::segments(prefix)?);
        Ok(dir)
    }

    /// File holding a key's value.
    fn path(&self, key: &str) -> Result<PathBuf> {
        let segments = Self::segments(key)?;
        let mut path = self.root.clone();
        if let Some((name, parents)) = segments.split_last() {
            path.extend(parents);
            path.push(format!("{name}.json"));
        }
        Ok(path)
    }

    /// Check if a key exists.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.path(key).is_ok_and(|p| p.exists())
    }

    /// List all keys under a prefix, sorted.
    ///
    /// # Errors
    ///
    /// Returns error if the prefix is invalid or a directory cannot be read.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.dir(prefix)?
        };

        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        Self::list_recursive(&dir, prefix, &mut results)?;

        results.sort();
        Ok(results)
    }

    fn list_recursive(dir: &Path, prefix: &str, results: &mut Vec<String>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };

            if path.is_dir() {
                Self::list_recursive(&path, &join_key(prefix, &name), results)?;
            } else if path.extension().is_some_and(|e| e == "json") {
                let stem = name.trim_end_matches(".json");
                results.push(join_key(prefix, stem));
            }
        }
        Ok(())
    }
}

fn join_key(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}/{segment}")
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temporary file and rename so a crash never leaves a
    /// half-written history behind.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path(key)?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
