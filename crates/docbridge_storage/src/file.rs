//! File-backed namespace log.

use crate::backend::LogBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A namespace log stored in a single file.
///
/// # Durability
///
/// - `append` writes through to the OS
/// - `sync` calls `File::sync_all()`
/// - `rewrite` writes a sibling `.tmp` file, syncs it and renames it over
///   the log
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    file: Mutex<File>,
    len: u64,
}

impl FileLog {
    /// Opens or creates the log at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = Self::open_file(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            len,
        })
    }

    /// Opens or creates the log, creating parent directories if needed.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(path: &Path) -> StorageResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl LogBackend for FileLog {
    fn append(&mut self, frame: &[u8]) -> StorageResult<u64> {
        let offset = self.len;
        if frame.is_empty() {
            return Ok(offset);
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::End(0))?;
        file.write_all(frame)?;
        self.len += frame.len() as u64;

        Ok(offset)
    }

    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;

        let mut buffer = Vec::with_capacity(self.len as usize);
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.len)
    }

    fn sync(&mut self) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
        if new_len > self.len {
            return Err(StorageError::TruncatePastEnd {
                requested: new_len,
                len: self.len,
            });
        }

        let file = self.file.lock();
        file.set_len(new_len)?;
        file.sync_all()?;
        drop(file);
        self.len = new_len;
        Ok(())
    }

    fn rewrite(&mut self, contents: &[u8]) -> StorageResult<()> {
        let temp = self.temp_path();
        {
            let mut tmp = File::create(&temp)?;
            tmp.write_all(contents)?;
            tmp.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;

        *self.file.lock() = Self::open_file(&self.path)?;
        self.len = contents.len() as u64;
        Ok(())
    }
}
