//! Namespace log: the on-disk form of a namespace.
//!
//! Every schema change and mutation is appended as one framed record:
//!
//! ```text
//! | magic "DBNL" (4) | version u16 LE (2) | length u32 LE (4) | CBOR payload | CRC32 LE (4) |
//! ```
//!
//! The CRC covers everything before it. Loading replays the records in
//! order. An incomplete final frame is the trace of an interrupted append
//! and is cut off; any other damage is reported as corruption.

use crate::error::{CoreError, CoreResult};
use crate::index::IndexDef;
use docbridge_storage::LogBackend;
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a namespace log frame.
pub const LOG_MAGIC: [u8; 4] = *b"DBNL";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
const HEADER_SIZE: usize = 10;

const CRC_SIZE: usize = 4;

/// One change to a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogRecord {
    /// An index was added.
    AddIndex(IndexDef),
    /// An index was dropped.
    DropIndex {
        /// Index name.
        name: String,
    },
    /// A document was written (insert, update, or upsert).
    Put {
        /// Document text.
        json: String,
    },
    /// A document was removed.
    Delete {
        /// Document text; only the primary key is read back.
        json: String,
    },
}

impl LogRecord {
    /// Encodes the record with its frame.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut payload = Vec::new();
        ciborium::into_writer(self, &mut payload).map_err(|e| CoreError::codec(e.to_string()))?;

        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::invalid_operation("namespace log record too large"))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&LOG_MAGIC);
        frame.extend_from_slice(&LOG_VERSION.to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);

        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }
}

/// Outcome of scanning a log buffer.
#[derive(Debug, Default)]
pub struct DecodedLog {
    /// Records of every complete frame.
    pub records: Vec<LogRecord>,
    /// Length of the valid prefix.
    pub valid_len: u64,
    /// True if bytes after the valid prefix were an incomplete frame.
    pub torn_tail: bool,
}

/// Decodes every frame of a log buffer.
pub fn decode_frames(data: &[u8]) -> CoreResult<DecodedLog> {
    let mut decoded = DecodedLog::default();
    let mut offset = 0usize;

    while offset < data.len() {
        let rest = &data[offset..];
        if rest.len() < HEADER_SIZE {
            decoded.torn_tail = true;
            break;
        }
        if rest[0..4] != LOG_MAGIC {
            return Err(CoreError::log_corruption(format!(
                "invalid magic at offset {offset}"
            )));
        }
        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version > LOG_VERSION {
            return Err(CoreError::log_corruption(format!(
                "unsupported version {version} at offset {offset}"
            )));
        }
        let payload_len = u32::from_le_bytes([rest[6], rest[7], rest[8], rest[9]]) as usize;
        let total_len = HEADER_SIZE + payload_len + CRC_SIZE;
        if rest.len() < total_len {
            decoded.torn_tail = true;
            break;
        }

        let payload_end = HEADER_SIZE + payload_len;
        let stored = u32::from_le_bytes([
            rest[payload_end],
            rest[payload_end + 1],
            rest[payload_end + 2],
            rest[payload_end + 3],
        ]);
        let computed = compute_crc32(&rest[..payload_end]);
        if stored != computed {
            return Err(CoreError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        let record: LogRecord = ciborium::from_reader(&rest[HEADER_SIZE..payload_end])
            .map_err(|e| CoreError::codec(format!("record at offset {offset}: {e}")))?;
        decoded.records.push(record);

        offset += total_len;
        decoded.valid_len = offset as u64;
    }

    Ok(decoded)
}

/// Append-only log of one namespace.
pub struct NamespaceLog {
    backend: Box<dyn LogBackend>,
    sync_on_write: bool,
    records: usize,
}

impl NamespaceLog {
    /// Wraps a backend. Call [`NamespaceLog::load`] before appending.
    #[must_use]
    pub fn new(backend: Box<dyn LogBackend>, sync_on_write: bool) -> Self {
        Self {
            backend,
            sync_on_write,
            records: 0,
        }
    }

    /// Reads every record, cutting off a torn final frame.
    pub fn load(&mut self) -> CoreResult<Vec<LogRecord>> {
        let data = self.backend.read_all()?;
        let decoded = decode_frames(&data)?;
        if decoded.torn_tail {
            tracing::warn!(
                valid_len = decoded.valid_len,
                total_len = data.len(),
                "truncating incomplete record at end of namespace log"
            );
            self.backend.truncate(decoded.valid_len)?;
        }
        self.records = decoded.records.len();
        Ok(decoded.records)
    }

    /// Appends one record.
    pub fn append(&mut self, record: &LogRecord) -> CoreResult<()> {
        let frame = record.encode()?;
        self.write_frames(&frame, 1)
    }

    /// Appends several records with a single write.
    pub fn append_batch(&mut self, records: &[LogRecord]) -> CoreResult<()> {
        let mut frames = Vec::new();
        for record in records {
            frames.extend_from_slice(&record.encode()?);
        }
        self.write_frames(&frames, records.len())
    }

    /// Writes encoded frames; on failure the log is cut back to its
    /// previous length so no half-written record stays behind.
    fn write_frames(&mut self, frames: &[u8], count: usize) -> CoreResult<()> {
        let before = self.backend.len()?;
        let written = self.backend.append(frames).and_then(|_| {
            if self.sync_on_write {
                self.backend.sync()
            } else {
                Ok(())
            }
        });
        if let Err(err) = written {
            if let Err(undo) = self.backend.truncate(before) {
                tracing::warn!(error = %undo, "failed to cut back namespace log after write error");
            }
            return Err(err.into());
        }
        self.records += count;
        Ok(())
    }

    /// Replaces the log with `records`.
    pub fn rewrite(&mut self, records: &[LogRecord]) -> CoreResult<()> {
        let mut contents = Vec::new();
        for record in records {
            contents.extend_from_slice(&record.encode()?);
        }
        self.backend.rewrite(&contents)?;
        self.records = records.len();
        Ok(())
    }

    /// Number of records in the log.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Flushes the log to durable storage.
    pub fn sync(&mut self) -> CoreResult<()> {
        Ok(self.backend.sync()?)
    }
}

impl std::fmt::Debug for NamespaceLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceLog")
            .field("records", &self.records)
            .field("sync_on_write", &self.sync_on_write)
            .finish_non_exhaustive()
    }
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{FieldType, IndexOpts, IndexType};
    use docbridge_storage::MemoryLog;

    fn sample_records() -> Vec<LogRecord> {
        vec![
            LogRecord::AddIndex(IndexDef::new(
                "id",
                IndexType::Hash,
                FieldType::Int,
                IndexOpts::new().pk(true),
            )),
            LogRecord::Put {
                json: r#"{"id":1}"#.into(),
            },
            LogRecord::Delete {
                json: r#"{"id":1}"#.into(),
            },
            LogRecord::DropIndex { name: "x".into() },
        ]
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn append_then_load() {
        let backend = MemoryLog::new();
        let mut log = NamespaceLog::new(Box::new(backend.clone()), false);
        for record in sample_records() {
            log.append(&record).unwrap();
        }

        let mut reopened = NamespaceLog::new(Box::new(backend), false);
        assert_eq!(reopened.load().unwrap(), sample_records());
        assert_eq!(reopened.record_count(), 4);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let backend = MemoryLog::new();
        let mut log = NamespaceLog::new(Box::new(backend.clone()), false);
        log.append(&sample_records()[1]).unwrap();
        let good_len = backend.data().len();

        let mut frame = sample_records()[0].encode().unwrap();
        frame.truncate(frame.len() - 3);
        let mut damaged = backend.data();
        damaged.extend_from_slice(&frame);

        let damaged_backend = MemoryLog::with_data(damaged);
        let mut reopened = NamespaceLog::new(Box::new(damaged_backend.clone()), false);
        assert_eq!(reopened.load().unwrap().len(), 1);
        assert_eq!(damaged_backend.data().len(), good_len);
    }

    #[test]
    fn checksum_mismatch_detected() {
        let mut data = sample_records()[1].encode().unwrap();
        data.extend_from_slice(&sample_records()[2].encode().unwrap());
        data[HEADER_SIZE + 1] ^= 0xFF;

        assert!(matches!(
            decode_frames(&data),
            Err(CoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut data = sample_records()[1].encode().unwrap();
        data[0] = b'X';
        assert!(matches!(
            decode_frames(&data),
            Err(CoreError::LogCorruption { .. })
        ));
    }

    #[test]
    fn batch_is_one_write() {
        let backend = MemoryLog::new();
        let mut log = NamespaceLog::new(Box::new(backend.clone()), false);
        log.append_batch(&sample_records()).unwrap();
        assert_eq!(log.record_count(), 4);

        let mut reopened = NamespaceLog::new(Box::new(backend), false);
        assert_eq!(reopened.load().unwrap(), sample_records());
    }

    #[test]
    fn rewrite_replaces_records() {
        let backend = MemoryLog::new();
        let mut log = NamespaceLog::new(Box::new(backend.clone()), true);
        for record in sample_records() {
            log.append(&record).unwrap();
        }
        log.rewrite(&sample_records()[..1]).unwrap();
        assert_eq!(log.record_count(), 1);

        assert_eq!(decode_frames(&backend.data()).unwrap().records.len(), 1);
    }
}
