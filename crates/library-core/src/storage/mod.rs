//! Persistence backends
//!
//! A [`StorageBackend`] loads and saves the named byte-sections a
//! [`crate::stacks::Stacks`] is built from (`vectors`, `catalog`, `graph`,
//! `learning`) without knowing anything about their contents. The reference
//! implementation, [`FileStorageBackend`], writes them gzip-compressed to a
//! single file behind a tagged-section container (spec §6); [`MemoryStorageBackend`]
//! keeps them in a `HashMap` for tests that don't need a filesystem.

mod file;
mod memory;

pub use file::FileStorageBackend;
pub use memory::MemoryStorageBackend;

use std::collections::BTreeMap;

/// Errors raised by a [`StorageBackend`].
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem read/write failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Magic mismatch, unsupported container version, or a truncated record.
    #[error("corrupt data: {0}")]
    Corrupt(String),
}

/// Named byte-sections a backend persists. Keys are short tags
/// (`"vectors"`, `"catalog"`, `"graph"`, `"learning"`); values are whatever
/// bytes the owning component produced via its own `snapshot()`.
pub type Sections = BTreeMap<String, Vec<u8>>;

/// Storage abstraction `Stacks` persists itself through.
///
/// Implementors own the wire format entirely; `Stacks` only ever deals in
/// named, opaque byte sections.
pub trait StorageBackend: Send + Sync {
    /// Load every section previously saved, or an empty map if nothing has
    /// been saved yet.
    fn load(&self) -> Result<Sections, StorageError>;

    /// Persist `sections`, replacing whatever was previously saved.
    fn save(&self, sections: &Sections) -> Result<(), StorageError>;

    /// Flush and release any resources held open (file handles, locks).
    /// A no-op for backends with nothing to release.
    fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
