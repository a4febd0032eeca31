//! Log backend trait definition.

use crate::error::StorageResult;

/// An append-only byte log backing one namespace.
///
/// # Invariants
///
/// - `append` returns the offset of the first byte written
/// - `read_all` returns every byte appended and not truncated, in order
/// - `rewrite` replaces the whole log atomically: a crash leaves either the
///   old or the new contents, never a mix
pub trait LogBackend: Send + Sync {
    /// Appends a frame to the end of the log and returns its offset.
    fn append(&mut self, frame: &[u8]) -> StorageResult<u64>;

    /// Reads the entire log.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Returns the current log length in bytes.
    fn len(&self) -> StorageResult<u64>;

    /// Returns true if nothing has been appended.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Makes every appended byte durable.
    fn sync(&mut self) -> StorageResult<()>;

    /// Drops everything after `new_len`.
    ///
    /// Used to cut a torn record off the end of the log during replay.
    ///
    /// # Errors
    ///
    /// Fails if `new_len` is greater than the current length.
    fn truncate(&mut self, new_len: u64) -> StorageResult<()>;

    /// Atomically replaces the log contents.
    fn rewrite(&mut self, contents: &[u8]) -> StorageResult<()>;
}
