//! Pack index ("VIDX") reading, writing, and lookup.
//!
//! The index maps OID → (offset, kind, logical size) for random access into
//! a packfile. Format (big-endian):
//!
//! ```text
//! Header:  "VIDX" (4 bytes) | version (u32 = 1) | entry count (u32)
//! Entries: N × { 64 hex bytes OID | u64 offset | u8 kind | u64 size },
//!          sorted by OID
//! Trailer: 32-byte pack checksum | 32-byte index checksum
//! ```
//!
//! The kind byte is the resolved object kind (1 commit, 2 tree, 3 blob) and
//! the size is the fully materialized object size, so callers learn both
//! without touching the pack even for deltified entries.

use std::path::{Path, PathBuf};

use memmap2::Mmap;
use vec_hash::{Hasher, ObjectId};
use vec_object::ObjectKind;

use crate::{kind_from_number, kind_number, PackError, VIDX_ENTRY_SIZE, VIDX_SIGNATURE, VIDX_VERSION};

const HEADER_SIZE: usize = 12;
const TRAILER_SIZE: usize = 64; // pack checksum + index checksum

/// One record in the pack index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub oid: ObjectId,
    /// Byte offset of the entry header in the pack file.
    pub offset: u64,
    /// Resolved object kind.
    pub kind: ObjectKind,
    /// Uncompressed size of the materialized object.
    pub size: u64,
}

/// Memory-mapped pack index providing OID lookup.
pub struct PackIndex {
    data: Mmap,
    num_objects: u32,
    idx_path: PathBuf,
}

impl PackIndex {
    /// Open a pack index file, validating its header and geometry.
    pub fn open(idx_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let idx_path = idx_path.as_ref().to_path_buf();
        let file = std::fs::File::open(&idx_path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < HEADER_SIZE + TRAILER_SIZE {
            return Err(PackError::InvalidIndex("file too small".into()));
        }
        if &data[0..4] != VIDX_SIGNATURE {
            return Err(PackError::InvalidIndex("bad VIDX signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != VIDX_VERSION {
            return Err(PackError::InvalidIndex(format!(
                "unsupported version {version}, expected {VIDX_VERSION}"
            )));
        }
        let num_objects = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let expected = HEADER_SIZE + num_objects as usize * VIDX_ENTRY_SIZE + TRAILER_SIZE;
        if data.len() != expected {
            return Err(PackError::InvalidIndex(format!(
                "file is {} bytes, geometry wants {expected}",
                data.len()
            )));
        }

        Ok(Self {
            data,
            num_objects,
            idx_path,
        })
    }

    /// Number of objects indexed.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Path to the .idx file.
    pub fn path(&self) -> &Path {
        &self.idx_path
    }

    /// Look up an OID. Entries are hash-sorted, so this is a binary search.
    pub fn lookup(&self, oid: &ObjectId) -> Option<IndexEntry> {
        let target = oid.to_hex();
        let target = target.as_bytes();

        let mut low = 0usize;
        let mut high = self.num_objects as usize;
        while low < high {
            let mid = low + (high - low) / 2;
            match self.hex_at(mid).cmp(target) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => return self.entry_at(mid),
            }
        }
        None
    }

    /// The entry at a sorted position, or `None` if the record is malformed.
    pub fn entry_at(&self, index: usize) -> Option<IndexEntry> {
        if index >= self.num_objects as usize {
            return None;
        }
        let start = HEADER_SIZE + index * VIDX_ENTRY_SIZE;
        let record = &self.data[start..start + VIDX_ENTRY_SIZE];

        let hex = std::str::from_utf8(&record[..64]).ok()?;
        let oid = ObjectId::from_hex(hex).ok()?;
        let offset = u64::from_be_bytes(record[64..72].try_into().ok()?);
        let kind = kind_from_number(record[72])?;
        let size = u64::from_be_bytes(record[73..81].try_into().ok()?);

        Some(IndexEntry {
            oid,
            offset,
            kind,
            size,
        })
    }

    /// Iterate all entries in hash order.
    pub fn iter(&self) -> impl Iterator<Item = IndexEntry> + '_ {
        (0..self.num_objects as usize).filter_map(|i| self.entry_at(i))
    }

    /// The pack checksum recorded in the trailer.
    pub fn pack_checksum(&self) -> Result<ObjectId, PackError> {
        let start = self.data.len() - TRAILER_SIZE;
        ObjectId::from_bytes(&self.data[start..start + 32]).map_err(PackError::Hash)
    }

    /// Verify the index's own trailing checksum.
    pub fn verify_checksum(&self) -> Result<(), PackError> {
        let body_end = self.data.len() - 32;
        let expected = ObjectId::from_bytes(&self.data[body_end..])?;
        let actual = Hasher::digest(&self.data[..body_end]);
        if actual != expected {
            return Err(PackError::ChecksumMismatch {
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(())
    }

    fn hex_at(&self, index: usize) -> &[u8] {
        let start = HEADER_SIZE + index * VIDX_ENTRY_SIZE;
        &self.data[start..start + 64]
    }
}

/// Write a pack index for the given entries and pack checksum.
///
/// Entries are sorted by OID before serialization.
pub fn write_pack_index(
    idx_path: &Path,
    entries: &mut [IndexEntry],
    pack_checksum: &ObjectId,
) -> Result<PathBuf, PackError> {
    entries.sort_by(|a, b| a.oid.cmp(&b.oid));

    let mut buf =
        Vec::with_capacity(HEADER_SIZE + entries.len() * VIDX_ENTRY_SIZE + TRAILER_SIZE);

    buf.extend_from_slice(VIDX_SIGNATURE);
    buf.extend_from_slice(&VIDX_VERSION.to_be_bytes());
    buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    for entry in entries.iter() {
        buf.extend_from_slice(entry.oid.to_hex().as_bytes());
        buf.extend_from_slice(&entry.offset.to_be_bytes());
        buf.push(kind_number(entry.kind));
        buf.extend_from_slice(&entry.size.to_be_bytes());
    }

    buf.extend_from_slice(pack_checksum.as_bytes());

    let idx_checksum = Hasher::digest(&buf);
    buf.extend_from_slice(idx_checksum.as_bytes());

    let idx_path = idx_path.to_path_buf();
    std::fs::write(&idx_path, &buf)?;
    Ok(idx_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<IndexEntry> {
        vec![
            IndexEntry {
                oid: ObjectId([0xcc; 32]),
                offset: 300,
                kind: ObjectKind::Blob,
                size: 42,
            },
            IndexEntry {
                oid: ObjectId([0x11; 32]),
                offset: 12,
                kind: ObjectKind::Commit,
                size: 180,
            },
            IndexEntry {
                oid: ObjectId([0x88; 32]),
                offset: 150,
                kind: ObjectKind::Tree,
                size: 77,
            },
        ]
    }

    fn write_and_open(entries: &mut [IndexEntry]) -> (tempfile::TempDir, PackIndex) {
        let dir = tempfile::tempdir().unwrap();
        let idx_path = dir.path().join("test.idx");
        write_pack_index(&idx_path, entries, &ObjectId([0xee; 32])).unwrap();
        let idx = PackIndex::open(&idx_path).unwrap();
        (dir, idx)
    }

    #[test]
    fn write_open_lookup() {
        let mut entries = sample_entries();
        let (_dir, idx) = write_and_open(&mut entries);

        assert_eq!(idx.num_objects(), 3);
        let found = idx.lookup(&ObjectId([0x88; 32])).unwrap();
        assert_eq!(found.offset, 150);
        assert_eq!(found.kind, ObjectKind::Tree);
        assert_eq!(found.size, 77);

        assert!(idx.lookup(&ObjectId([0x99; 32])).is_none());
    }

    #[test]
    fn entries_sorted_by_oid() {
        let mut entries = sample_entries();
        let (_dir, idx) = write_and_open(&mut entries);

        let oids: Vec<_> = idx.iter().map(|e| e.oid).collect();
        let mut sorted = oids.clone();
        sorted.sort();
        assert_eq!(oids, sorted);
    }

    #[test]
    fn pack_checksum_recorded() {
        let mut entries = sample_entries();
        let (_dir, idx) = write_and_open(&mut entries);
        assert_eq!(idx.pack_checksum().unwrap(), ObjectId([0xee; 32]));
    }

    #[test]
    fn own_checksum_verifies() {
        let mut entries = sample_entries();
        let (_dir, idx) = write_and_open(&mut entries);
        idx.verify_checksum().unwrap();
    }

    #[test]
    fn corrupted_index_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let idx_path = dir.path().join("bad.idx");
        let mut entries = sample_entries();
        write_pack_index(&idx_path, &mut entries, &ObjectId([0xee; 32])).unwrap();

        let mut data = std::fs::read(&idx_path).unwrap();
        data[HEADER_SIZE + 70] ^= 0xff; // flip a byte inside an entry
        std::fs::write(&idx_path, &data).unwrap();

        let idx = PackIndex::open(&idx_path).unwrap();
        assert!(matches!(
            idx.verify_checksum(),
            Err(PackError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn bad_signature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let idx_path = dir.path().join("bad.idx");
        std::fs::write(&idx_path, vec![0u8; 100]).unwrap();
        assert!(matches!(
            PackIndex::open(&idx_path),
            Err(PackError::InvalidIndex(_))
        ));
    }

    #[test]
    fn geometry_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let idx_path = dir.path().join("short.idx");
        let mut entries = sample_entries();
        write_pack_index(&idx_path, &mut entries, &ObjectId([0xee; 32])).unwrap();

        let mut data = std::fs::read(&idx_path).unwrap();
        data.truncate(data.len() - 10);
        std::fs::write(&idx_path, &data).unwrap();

        assert!(PackIndex::open(&idx_path).is_err());
    }

    #[test]
    fn empty_index_roundtrip() {
        let (_dir, idx) = write_and_open(&mut []);
        assert_eq!(idx.num_objects(), 0);
        assert!(idx.lookup(&ObjectId::NULL).is_none());
        idx.verify_checksum().unwrap();
    }
}
