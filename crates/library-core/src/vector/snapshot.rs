//! Binary snapshot format for [`VectorIndex`]
//!
//! Layout (spec §4.1): 4-byte magic `VOLS`, 2-byte format version (LE), a
//! 4-byte count (LE), then per volume: length-prefixed id, length-prefixed
//! text, length-prefixed metadata (sorted key/value pairs as two
//! length-prefixed strings each), 8-byte created_at (millis since epoch,
//! LE), 8-byte access count (LE), 8-byte last-access (millis, LE), 4-byte
//! dimension (LE), `dimension * 4` bytes of little-endian floats.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};

use super::index::VectorIndex;
use crate::error::LibraryError;
use crate::volume::Volume;

const MAGIC: &[u8; 4] = b"VOLS";
const FORMAT_VERSION: u16 = 1;

fn corrupt(msg: impl Into<String>) -> LibraryError {
    LibraryError::Corrupt(msg.into())
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn string(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], LibraryError> {
        if self.pos + n > self.data.len() {
            return Err(corrupt("unexpected end of snapshot"));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, LibraryError> {
        Ok(u16::from_le_bytes(self.bytes(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, LibraryError> {
        Ok(u32::from_le_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, LibraryError> {
        Ok(u64::from_le_bytes(self.bytes(8)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64, LibraryError> {
        Ok(i64::from_le_bytes(self.bytes(8)?.try_into().unwrap()))
    }

    fn f32(&mut self) -> Result<f32, LibraryError> {
        Ok(f32::from_le_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String, LibraryError> {
        let len = self.u32()? as usize;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| corrupt(format!("invalid utf-8: {e}")))
    }
}

impl VectorIndex {
    /// Serialize every volume into the binary format described above.
    pub fn snapshot(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.buf.extend_from_slice(MAGIC);
        w.u16(FORMAT_VERSION);

        let mut volumes: Vec<&Volume> = self.iter().collect();
        volumes.sort_by(|a, b| a.id.cmp(&b.id));

        w.u32(volumes.len() as u32);
        for v in volumes {
            w.string(&v.id);
            w.string(&v.text);

            w.u32(v.metadata.len() as u32);
            for (k, val) in &v.metadata {
                w.string(k);
                w.string(val);
            }

            w.i64(v.created_at.timestamp_millis());
            w.u64(v.access_count);
            w.i64(v.last_accessed_at.timestamp_millis());

            w.u32(v.embedding.len() as u32);
            for f in &v.embedding {
                w.f32(*f);
            }
        }

        w.buf
    }

    /// Restore a snapshot produced by [`VectorIndex::snapshot`].
    ///
    /// Fails with [`LibraryError::Corrupt`] on magic mismatch, unsupported
    /// version, or premature end.
    pub fn restore(bytes: &[u8]) -> Result<Self, LibraryError> {
        let mut r = Reader::new(bytes);

        let magic = r.bytes(4)?;
        if magic != MAGIC {
            return Err(corrupt("magic mismatch"));
        }

        let version = r.u16()?;
        if version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported version: {version}")));
        }

        let count = r.u32()?;
        let mut index = VectorIndex::new();

        for _ in 0..count {
            let id = r.string()?;
            let text = r.string()?;

            let meta_count = r.u32()?;
            let mut metadata = BTreeMap::new();
            for _ in 0..meta_count {
                let k = r.string()?;
                let v = r.string()?;
                metadata.insert(k, v);
            }

            let created_millis = r.i64()?;
            let access_count = r.u64()?;
            let last_accessed_millis = r.i64()?;

            let dim = r.u32()? as usize;
            let mut embedding = Vec::with_capacity(dim);
            for _ in 0..dim {
                embedding.push(r.f32()?);
            }

            let created_at = millis_to_datetime(created_millis)?;
            let last_accessed_at = millis_to_datetime(last_accessed_millis)?;

            let volume = Volume {
                id,
                text,
                embedding,
                metadata,
                created_at,
                access_count,
                last_accessed_at,
            };

            // restore() bypasses VectorIndex::put's validation: a snapshot
            // is trusted to already satisfy the unit-magnitude invariant.
            index.insert_raw(volume);
        }

        Ok(index)
    }
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, LibraryError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| corrupt(format!("invalid timestamp: {millis}")))
}
