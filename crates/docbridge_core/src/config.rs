//! Connection and namespace storage options.

use serde::{Deserialize, Serialize};

/// How namespaces are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    /// One append-only log file per namespace.
    #[default]
    FileLog,
    /// Nothing is written to disk even when a directory is given.
    Memory,
}

/// Options for connecting an embedded engine.
#[derive(Debug, Clone)]
pub struct ConnectOpts {
    /// Namespace persistence mode.
    pub storage_type: StorageType,

    /// Skip namespaces whose log fails to load instead of failing `connect`.
    pub allow_namespace_errors: bool,

    /// Load every namespace found in the storage directory during `connect`.
    pub open_namespaces: bool,

    /// Sync namespace logs after every write (safer but slower).
    pub sync_on_write: bool,

    /// Rewrite a namespace log on load once it holds more than this many
    /// records beyond twice the live state.
    pub compaction_slack: usize,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            storage_type: StorageType::FileLog,
            allow_namespace_errors: false,
            open_namespaces: true,
            sync_on_write: false,
            compaction_slack: 64,
        }
    }
}

impl ConnectOpts {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the namespace persistence mode.
    #[must_use]
    pub const fn with_storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = storage_type;
        self
    }

    /// Sets whether broken namespaces are skipped during `connect`.
    #[must_use]
    pub const fn allow_namespace_errors(mut self, value: bool) -> Self {
        self.allow_namespace_errors = value;
        self
    }

    /// Sets whether stored namespaces are loaded during `connect`.
    #[must_use]
    pub const fn open_namespaces(mut self, value: bool) -> Self {
        self.open_namespaces = value;
        self
    }

    /// Sets whether namespace logs are synced on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the compaction slack.
    #[must_use]
    pub const fn compaction_slack(mut self, records: usize) -> Self {
        self.compaction_slack = records;
        self
    }
}

/// Per-namespace storage options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOpts {
    /// Persist the namespace when the engine has a storage directory.
    pub enabled: bool,
    /// Create the namespace log if it does not exist yet.
    pub create_if_missing: bool,
}

impl Default for StorageOpts {
    fn default() -> Self {
        Self {
            enabled: true,
            create_if_missing: true,
        }
    }
}

impl StorageOpts {
    /// Creates options with storage enabled and creation allowed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the namespace is persisted.
    #[must_use]
    pub const fn enabled(mut self, value: bool) -> Self {
        self.enabled = value;
        self
    }

    /// Sets whether a missing namespace is created.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_connect_opts() {
        let opts = ConnectOpts::default();
        assert_eq!(opts.storage_type, StorageType::FileLog);
        assert!(!opts.allow_namespace_errors);
        assert!(opts.open_namespaces);
    }

    #[test]
    fn builder_pattern() {
        let opts = ConnectOpts::new()
            .allow_namespace_errors(true)
            .with_storage_type(StorageType::Memory)
            .sync_on_write(true);

        assert!(opts.allow_namespace_errors);
        assert_eq!(opts.storage_type, StorageType::Memory);
        assert!(opts.sync_on_write);

        let storage = StorageOpts::new().enabled(false);
        assert!(!storage.enabled);
        assert!(storage.create_if_missing);
    }
}
