//! Storage directory management.
//!
//! Layout of an embedded database directory:
//!
//! ```text
//! <path>/
//! ├─ LOCK            # Advisory lock for single-process access
//! ├─ items.nslog     # One log per namespace
//! └─ users.nslog
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";

/// Extension of namespace log files.
pub const NAMESPACE_LOG_EXT: &str = "nslog";

/// An opened storage directory.
///
/// Holds an exclusive lock on the directory for as long as it lives, so only
/// one engine instance can own a directory at a time.
#[derive(Debug)]
pub struct StorageDir {
    path: PathBuf,
    _lock_file: File,
}

impl StorageDir {
    /// Opens a storage directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (`DatabaseLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_operation(format!(
                    "storage directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the log of namespace `name`.
    #[must_use]
    pub fn namespace_log_path(&self, name: &str) -> PathBuf {
        self.path.join(format!("{name}.{NAMESPACE_LOG_EXT}"))
    }

    /// Returns true if namespace `name` has a log.
    #[must_use]
    pub fn has_namespace(&self, name: &str) -> bool {
        self.namespace_log_path(name).is_file()
    }

    /// Names of every namespace with a log, sorted.
    pub fn list_namespaces(&self) -> CoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(NAMESPACE_LOG_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Deletes the log of namespace `name`, if any.
    pub fn remove_namespace(&self, name: &str) -> CoreResult<()> {
        let path = self.namespace_log_path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
