//! In-memory backend for tests that don't need a filesystem

use std::sync::Mutex;

use super::{Sections, StorageBackend, StorageError};

/// Keeps the most recently saved sections in memory. Never errors.
#[derive(Debug, Default)]
pub struct MemoryStorageBackend {
    sections: Mutex<Sections>,
}

impl MemoryStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorageBackend {
    fn load(&self) -> Result<Sections, StorageError> {
        Ok(self.sections.lock().expect("storage mutex poisoned").clone())
    }

    fn save(&self, sections: &Sections) -> Result<(), StorageError> {
        *self.sections.lock().expect("storage mutex poisoned") = sections.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let backend = MemoryStorageBackend::new();
        let mut sections = Sections::new();
        sections.insert("vectors".into(), b"hello".to_vec());
        backend.save(&sections).unwrap();
        assert_eq!(backend.load().unwrap(), sections);
    }

    #[test]
    fn starts_empty() {
        let backend = MemoryStorageBackend::new();
        assert!(backend.load().unwrap().is_empty());
    }
}
