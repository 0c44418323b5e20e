//! Gzip-wrapped, tagged-section file backend
//!
//! Wire format (spec §6), written after gzip-compressing the whole thing:
//!
//! ```text
//! magic    4 bytes  b"LIBC"
//! version  1 byte   currently 1
//! sections repeated until EOF:
//!     tag    4 bytes  b"VECS" | b"CATL" | b"GRPH" | b"LERN"
//!     length 4 bytes  big-endian u32
//!     payload <length> bytes
//! ```
//!
//! Writes go to a temp file in the same directory and are renamed into
//! place, so a crash mid-write never corrupts the previous snapshot.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::{Sections, StorageBackend, StorageError};

const MAGIC: &[u8; 4] = b"LIBC";
const VERSION: u8 = 1;

fn tag_for(key: &str) -> Option<[u8; 4]> {
    match key {
        "vectors" => Some(*b"VECS"),
        "catalog" => Some(*b"CATL"),
        "graph" => Some(*b"GRPH"),
        "learning" => Some(*b"LERN"),
        _ => None,
    }
}

fn key_for(tag: &[u8; 4]) -> Option<&'static str> {
    match tag {
        b"VECS" => Some("vectors"),
        b"CATL" => Some("catalog"),
        b"GRPH" => Some("graph"),
        b"LERN" => Some("learning"),
        _ => None,
    }
}

/// Persists sections to a single gzip-compressed file on disk.
#[derive(Debug, Clone)]
pub struct FileStorageBackend {
    path: PathBuf,
}

impl FileStorageBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn encode(sections: &Sections) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(MAGIC);
        body.push(VERSION);

        for (key, payload) in sections {
            let Some(tag) = tag_for(key) else {
                tracing::warn!(section = %key, "skipping unrecognized section on save");
                continue;
            };
            body.extend_from_slice(&tag);
            body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            body.extend_from_slice(payload);
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&body)
            .expect("writing to an in-memory buffer cannot fail");
        encoder.finish().expect("gzip finish on an in-memory buffer cannot fail")
    }

    fn decode(compressed: &[u8]) -> Result<Sections, StorageError> {
        let mut body = Vec::new();
        GzDecoder::new(compressed)
            .read_to_end(&mut body)
            .map_err(|e| StorageError::Corrupt(format!("gzip: {e}")))?;

        if body.len() < 5 || &body[0..4] != MAGIC {
            return Err(StorageError::Corrupt("bad magic".into()));
        }
        let version = body[4];
        if version > VERSION {
            return Err(StorageError::Corrupt(format!(
                "unsupported version: {version}"
            )));
        }

        let mut sections = Sections::new();
        let mut cursor = 5usize;
        while cursor < body.len() {
            if cursor + 8 > body.len() {
                return Err(StorageError::Corrupt("truncated section header".into()));
            }
            let tag: [u8; 4] = body[cursor..cursor + 4]
                .try_into()
                .expect("slice is exactly 4 bytes");
            let len = u32::from_be_bytes(
                body[cursor + 4..cursor + 8]
                    .try_into()
                    .expect("slice is exactly 4 bytes"),
            ) as usize;
            cursor += 8;

            if cursor + len > body.len() {
                return Err(StorageError::Corrupt("truncated section payload".into()));
            }
            let payload = body[cursor..cursor + len].to_vec();
            cursor += len;

            match key_for(&tag) {
                Some(key) => {
                    sections.insert(key.to_string(), payload);
                }
                None => tracing::warn!(tag = ?String::from_utf8_lossy(&tag), "skipping unknown section on load"),
            }
        }

        Ok(sections)
    }
}

impl StorageBackend for FileStorageBackend {
    fn load(&self) -> Result<Sections, StorageError> {
        if !self.path.exists() {
            return Ok(Sections::new());
        }
        let bytes = fs::read(&self.path)?;
        Self::decode(&bytes)
    }

    fn save(&self, sections: &Sections) -> Result<(), StorageError> {
        let encoded = Self::encode(sections);

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let tmp_path = dir.join(format!(
            ".{}.tmp",
            self.path.file_name().and_then(|n| n.to_str()).unwrap_or("library-core")
        ));

        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&encoded)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sections() -> Sections {
        let mut sections = Sections::new();
        sections.insert("vectors".into(), b"vector-bytes".to_vec());
        sections.insert("catalog".into(), b"catalog-bytes".to_vec());
        sections.insert("graph".into(), b"graph-bytes".to_vec());
        sections.insert("learning".into(), b"learning-bytes".to_vec());
        sections
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStorageBackend::new(dir.path().join("library.bin"));

        let sections = sample_sections();
        backend.save(&sections).unwrap();
        let loaded = backend.load().unwrap();

        assert_eq!(loaded, sections);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStorageBackend::new(dir.path().join("does-not-exist.bin"));
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.bin");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"NOPE\x01").unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let backend = FileStorageBackend::new(path);
        assert!(matches!(backend.load(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn rejects_future_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.bin");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(MAGIC).unwrap();
        encoder.write_all(&[VERSION + 1]).unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let backend = FileStorageBackend::new(path);
        assert!(matches!(backend.load(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn overwrites_existing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStorageBackend::new(dir.path().join("library.bin"));

        backend.save(&sample_sections()).unwrap();

        let mut second = Sections::new();
        second.insert("vectors".into(), b"v2".to_vec());
        backend.save(&second).unwrap();

        assert_eq!(backend.load().unwrap(), second);
    }
}
