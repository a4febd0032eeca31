//! In-memory namespace log.

use crate::backend::LogBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// A namespace log kept in memory.
///
/// Clones share the same buffer, which lets tests keep a handle on the
/// bytes a namespace wrote and replay them into a fresh namespace.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    data: Arc<RwLock<Vec<u8>>>,
}

impl MemoryLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log with pre-existing contents.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of the log contents.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl LogBackend for MemoryLog {
    fn append(&mut self, frame: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(frame);
        Ok(offset)
    }

    fn read_all(&self) -> StorageResult<Vec<u8>> {
        Ok(self.data())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let len = data.len() as u64;
        if new_len > len {
            return Err(StorageError::TruncatePastEnd {
                requested: new_len,
                len,
            });
        }
        data.truncate(new_len as usize);
        Ok(())
    }

    fn rewrite(&mut self, contents: &[u8]) -> StorageResult<()> {
        *self.data.write() = contents.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn memory_new_is_empty() {
        let log = MemoryLog::new();
        assert!(log.is_empty().unwrap());
        assert!(log.data().is_empty());
    }

    #[test]
    fn memory_append_returns_offsets() {
        let mut log = MemoryLog::new();
        assert_eq!(log.append(b"hello").unwrap(), 0);
        assert_eq!(log.append(b" world").unwrap(), 5);
        assert_eq!(log.read_all().unwrap(), b"hello world");
    }

    #[test]
    fn memory_clones_share_buffer() {
        let mut log = MemoryLog::new();
        let observer = log.clone();
        log.append(b"shared").unwrap();
        assert_eq!(observer.data(), b"shared");
    }

    #[test]
    fn memory_truncate_and_rewrite() {
        let mut log = MemoryLog::with_data(b"abcdef".to_vec());
        log.truncate(3).unwrap();
        assert_eq!(log.data(), b"abc");

        assert!(log.truncate(4).is_err());

        log.rewrite(b"xy").unwrap();
        assert_eq!(log.len().unwrap(), 2);
    }

    proptest! {
        #[test]
        fn appended_frames_concatenate(frames in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..32), 0..16)) {
            let mut log = MemoryLog::new();
            let mut expected = Vec::new();
            for frame in &frames {
                let offset = log.append(frame).unwrap();
                prop_assert_eq!(offset, expected.len() as u64);
                expected.extend_from_slice(frame);
            }
            prop_assert_eq!(log.read_all().unwrap(), expected);
        }
    }
}
