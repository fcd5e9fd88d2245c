//! Durable storage for delivered-message keys.
//!
//! The file format is flat text: one key per line, no header, no ordering
//! requirement. Blank lines are ignored on read.

use crate::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Backend holding the persisted sent-message keys.
pub trait SentStore: Send + Sync {
    /// Reads every persisted key, in file order.
    fn read_keys(&self) -> Result<Vec<String>>;

    /// Replaces the persisted contents with `keys`.
    fn write_keys(&self, keys: &[&str]) -> Result<()>;

    /// Deletes the persisted contents.
    fn clear(&self) -> Result<()>;
}

/// Line-oriented file store.
///
/// Writes go to a sibling temporary file that is renamed over the target,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug, Clone)]
pub struct FileSentStore {
    path: PathBuf,
}

impl FileSentStore {
    /// Creates a store at `path`. Nothing is touched until the first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the store path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SentStore for FileSentStore {
    fn read_keys(&self) -> Result<Vec<String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::operation(
                    "read_sent_store",
                    format!("{}: {e}", self.path.display()),
                ));
            },
        };

        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn write_keys(&self, keys: &[&str]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| Error::operation("create_sent_store_dir", e))?;
        }

        let mut contents = String::with_capacity(keys.iter().map(|k| k.len() + 1).sum());
        for key in keys {
            contents.push_str(key);
            contents.push('\n');
        }

        let temp = self.temp_path();
        fs::write(&temp, contents).map_err(|e| {
            Error::operation("write_sent_store", format!("{}: {e}", temp.display()))
        })?;
        fs::rename(&temp, &self.path).map_err(|e| {
            Error::operation("replace_sent_store", format!("{}: {e}", self.path.display()))
        })
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::operation(
                "delete_sent_store",
                format!("{}: {e}", self.path.display()),
            )),
        }
    }
}

/// In-memory store for tests and dry runs.
///
/// `None` means no store exists, mirroring a missing file.
#[derive(Debug, Default)]
pub struct MemorySentStore {
    keys: Mutex<Option<Vec<String>>>,
}

impl MemorySentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `keys`.
    #[must_use]
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: Mutex::new(Some(keys.into_iter().map(Into::into).collect())),
        }
    }

    /// Returns the persisted keys, or `None` if nothing is persisted.
    #[must_use]
    pub fn snapshot(&self) -> Option<Vec<String>> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SentStore for MemorySentStore {
    fn read_keys(&self) -> Result<Vec<String>> {
        Ok(self.snapshot().unwrap_or_default())
    }

    fn write_keys(&self, keys: &[&str]) -> Result<()> {
        *self.keys.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(keys.iter().map(|k| (*k).to_string()).collect());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.keys.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
