//! PackFile: reading .pack files.
//!
//! A pack file contains a header, a sequence of zlib-compressed records
//! (possibly deltified), and a trailing SHA-256 checksum. Random access goes
//! through the VIDX companion index; `read_all` streams every object out of
//! a pack without one.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::bufread::ZlibDecoder;
use memmap2::Mmap;
use vec_hash::{Hasher, ObjectId};
use vec_object::ObjectKind;

use crate::entry::parse_entry_header;
use crate::index::PackIndex;
use crate::{
    PackEntryKind, PackError, PackedObject, MAX_DELTA_CHAIN_DEPTH, PACK_HEADER_SIZE,
    PACK_SIGNATURE, PACK_VERSION,
};

/// A memory-mapped packfile with its index.
pub struct PackFile {
    data: Mmap,
    index: PackIndex,
    pack_path: PathBuf,
    num_objects: u32,
}

impl PackFile {
    /// Open a pack file and its associated `.idx`.
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let pack_path = pack_path.as_ref().to_path_buf();
        let idx_path = pack_path.with_extension("idx");

        let file = std::fs::File::open(&pack_path)?;
        let data = unsafe { Mmap::map(&file)? };

        let num_objects = validate_header(&data)?;
        let index = PackIndex::open(&idx_path)?;

        if index.num_objects() != num_objects {
            return Err(PackError::InvalidHeader(format!(
                "pack has {} objects but index has {}",
                num_objects,
                index.num_objects()
            )));
        }

        Ok(Self {
            data,
            index,
            pack_path,
            num_objects,
        })
    }

    /// Read an object by OID.
    ///
    /// Returns `None` if the OID is not in this pack.
    pub fn read_object(&self, oid: &ObjectId) -> Result<Option<PackedObject>, PackError> {
        match self.index.lookup(oid) {
            Some(entry) => self.read_at_offset(entry.offset).map(Some),
            None => Ok(None),
        }
    }

    /// Read an object at a known offset in the pack.
    ///
    /// Resolves delta chains iteratively; a chain longer than
    /// [`MAX_DELTA_CHAIN_DEPTH`] (which a cycle would produce) is an error.
    pub fn read_at_offset(&self, offset: u64) -> Result<PackedObject, PackError> {
        let mut chain: Vec<Vec<u8>> = Vec::new();
        let mut current_offset = offset;

        for _ in 0..MAX_DELTA_CHAIN_DEPTH {
            let entry =
                parse_entry_header(&self.data[current_offset as usize..], current_offset)?;
            let payload = decompress_at(
                &self.data,
                entry.data_offset,
                entry.payload_size,
                current_offset,
            )?;

            match entry.kind {
                PackEntryKind::Commit | PackEntryKind::Tree | PackEntryKind::Blob => {
                    let kind = entry
                        .kind
                        .to_object_kind()
                        .ok_or(PackError::CorruptEntry(current_offset))?;

                    // Apply the collected deltas outward from the base.
                    let mut data = payload;
                    for delta in chain.iter().rev() {
                        data = crate::delta::apply_delta(&data, delta)?;
                    }
                    return Ok(PackedObject { kind, data });
                }
                PackEntryKind::Delta { base_oid } => {
                    chain.push(payload);
                    let base = self
                        .index
                        .lookup(&base_oid)
                        .ok_or(PackError::MissingBase(base_oid))?;
                    current_offset = base.offset;
                }
            }
        }

        Err(PackError::DeltaChainTooDeep {
            offset,
            max_depth: MAX_DELTA_CHAIN_DEPTH,
        })
    }

    /// Check if this pack contains the given OID.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.index.lookup(oid).is_some()
    }

    /// Read just the kind and logical size of an object, from the index.
    pub fn read_info(&self, oid: &ObjectId) -> Option<(ObjectKind, u64)> {
        self.index.lookup(oid).map(|e| (e.kind, e.size))
    }

    /// Number of objects in this pack.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// The pack index.
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Path to the .pack file.
    pub fn path(&self) -> &Path {
        &self.pack_path
    }

    /// Verify the pack and index thoroughly: both checksums, the recorded
    /// pack checksum in the index, and every object's hash, kind, and size
    /// against its index entry.
    pub fn verify(&self) -> Result<(), PackError> {
        verify_trailer(&self.data)?;
        self.index.verify_checksum()?;

        let recorded = self.index.pack_checksum()?;
        let body = &self.data[..self.data.len() - 32];
        let actual = Hasher::digest(body);
        if recorded != actual {
            return Err(PackError::ChecksumMismatch {
                expected: recorded.to_hex(),
                actual: actual.to_hex(),
            });
        }

        for entry in self.index.iter() {
            let obj = self.read_at_offset(entry.offset)?;
            let oid = Hasher::hash_object(obj.kind.as_str(), &obj.data);
            if oid != entry.oid {
                return Err(PackError::ChecksumMismatch {
                    expected: entry.oid.to_hex(),
                    actual: oid.to_hex(),
                });
            }
            if obj.kind != entry.kind || obj.data.len() as u64 != entry.size {
                return Err(PackError::CorruptEntry(entry.offset));
            }
        }
        Ok(())
    }
}

/// Stream every object out of a pack file without an index.
///
/// Base objects materialize immediately; delta records queue until their
/// base has been materialized. The delta target's kind is its base's kind.
/// Verifies the trailing checksum before touching any record.
pub fn read_all(pack_path: impl AsRef<Path>) -> Result<Vec<PackedObject>, PackError> {
    let data = std::fs::read(pack_path.as_ref())?;
    let num_objects = validate_header(&data)?;
    verify_trailer(&data)?;

    let body_end = data.len() - 32;
    let mut materialized: HashMap<ObjectId, (ObjectKind, Vec<u8>)> = HashMap::new();
    let mut order: Vec<ObjectId> = Vec::new();
    let mut pending: Vec<(u64, ObjectId, Vec<u8>)> = Vec::new(); // (offset, base, delta)

    let mut offset = PACK_HEADER_SIZE as u64;
    for _ in 0..num_objects {
        if offset as usize >= body_end {
            return Err(PackError::CorruptEntry(offset));
        }
        let entry = parse_entry_header(&data[offset as usize..body_end], offset)?;
        let (payload, consumed) = decompress_stream(
            &data[entry.data_offset as usize..body_end],
            entry.payload_size,
            offset,
        )?;

        match entry.kind {
            PackEntryKind::Commit | PackEntryKind::Tree | PackEntryKind::Blob => {
                let kind = entry
                    .kind
                    .to_object_kind()
                    .ok_or(PackError::CorruptEntry(offset))?;
                let oid = Hasher::hash_object(kind.as_str(), &payload);
                order.push(oid);
                materialized.insert(oid, (kind, payload));
            }
            PackEntryKind::Delta { base_oid } => {
                pending.push((offset, base_oid, payload));
            }
        }

        offset = entry.data_offset + consumed;
    }

    // Resolve queued deltas; deltas on deltas settle over multiple passes.
    // A pass without progress means a missing base or a cycle.
    let mut passes = 0;
    while !pending.is_empty() {
        passes += 1;
        if passes > MAX_DELTA_CHAIN_DEPTH {
            return Err(PackError::DeltaChainTooDeep {
                offset: pending[0].0,
                max_depth: MAX_DELTA_CHAIN_DEPTH,
            });
        }

        let mut unresolved = Vec::new();
        let mut progressed = false;
        for (rec_offset, base_oid, delta) in pending {
            match materialized.get(&base_oid) {
                Some((kind, base_data)) => {
                    let kind = *kind;
                    let target = crate::delta::apply_delta(base_data, &delta)?;
                    let oid = Hasher::hash_object(kind.as_str(), &target);
                    order.push(oid);
                    materialized.insert(oid, (kind, target));
                    progressed = true;
                }
                None => unresolved.push((rec_offset, base_oid, delta)),
            }
        }

        if !progressed {
            let (_, base_oid, _) = &unresolved[0];
            return Err(PackError::MissingBase(*base_oid));
        }
        pending = unresolved;
    }

    Ok(order
        .into_iter()
        .filter_map(|oid| {
            materialized
                .remove(&oid)
                .map(|(kind, data)| PackedObject { kind, data })
        })
        .collect())
}

/// Validate the 12-byte pack header, returning the object count.
fn validate_header(data: &[u8]) -> Result<u32, PackError> {
    if data.len() < PACK_HEADER_SIZE {
        return Err(PackError::InvalidHeader("file too small".into()));
    }
    if &data[0..4] != PACK_SIGNATURE {
        return Err(PackError::InvalidHeader("bad PACK signature".into()));
    }
    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if version != PACK_VERSION {
        return Err(PackError::UnsupportedVersion(version));
    }
    Ok(u32::from_be_bytes([data[8], data[9], data[10], data[11]]))
}

/// Verify the trailing SHA-256 covers everything before it.
fn verify_trailer(data: &[u8]) -> Result<(), PackError> {
    if data.len() < PACK_HEADER_SIZE + 32 {
        return Err(PackError::InvalidHeader("missing trailer".into()));
    }
    let body = &data[..data.len() - 32];
    let expected = ObjectId::from_bytes(&data[data.len() - 32..])?;
    let actual = Hasher::digest(body);
    if actual != expected {
        return Err(PackError::ChecksumMismatch {
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        });
    }
    Ok(())
}

/// Decompress one zlib stream with a known output size.
fn decompress_at(
    data: &[u8],
    data_offset: u64,
    expected_size: usize,
    entry_offset: u64,
) -> Result<Vec<u8>, PackError> {
    let (payload, _) = decompress_stream(&data[data_offset as usize..], expected_size, entry_offset)?;
    Ok(payload)
}

/// Decompress one zlib stream, returning the payload and compressed length.
fn decompress_stream(
    compressed: &[u8],
    expected_size: usize,
    entry_offset: u64,
) -> Result<(Vec<u8>, u64), PackError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut buf = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut buf)
        .map_err(|_| PackError::CorruptEntry(entry_offset))?;
    if buf.len() != expected_size {
        return Err(PackError::CorruptEntry(entry_offset));
    }
    Ok((buf, decoder.total_in()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::{create_pack, PackWriter};

    fn sample_objects() -> Vec<(ObjectKind, Vec<u8>)> {
        vec![
            (ObjectKind::Blob, b"first blob".to_vec()),
            (ObjectKind::Blob, b"second blob".to_vec()),
            (
                ObjectKind::Commit,
                // Arbitrary bytes; the pack layer does not parse payloads.
                vec![1, 2, 3, 4, 5, 6, 7, 8],
            ),
        ]
    }

    #[test]
    fn open_and_read_each_object() {
        let dir = tempfile::tempdir().unwrap();
        let objects = sample_objects();
        let (pack_path, _, _) = create_pack(dir.path(), "test", &objects).unwrap();

        let pack = PackFile::open(&pack_path).unwrap();
        assert_eq!(pack.num_objects(), 3);

        for (kind, data) in &objects {
            let oid = Hasher::hash_object(kind.as_str(), data);
            assert!(pack.contains(&oid));
            let obj = pack.read_object(&oid).unwrap().unwrap();
            assert_eq!(obj.kind, *kind);
            assert_eq!(&obj.data, data);
        }
    }

    #[test]
    fn missing_oid_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let (pack_path, _, _) = create_pack(dir.path(), "test", &sample_objects()).unwrap();
        let pack = PackFile::open(&pack_path).unwrap();

        assert!(!pack.contains(&ObjectId([0x07; 32])));
        assert!(pack.read_object(&ObjectId([0x07; 32])).unwrap().is_none());
    }

    #[test]
    fn deltified_object_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let base: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        let mut variant = base.clone();
        variant[1500] = 0xff;

        let objects = vec![
            (ObjectKind::Blob, base.clone()),
            (ObjectKind::Blob, variant.clone()),
        ];
        let (pack_path, _, _) = create_pack(dir.path(), "delta", &objects).unwrap();

        let pack = PackFile::open(&pack_path).unwrap();
        let variant_oid = Hasher::hash_object("blob", &variant);
        let obj = pack.read_object(&variant_oid).unwrap().unwrap();
        assert_eq!(obj.data, variant);

        let (kind, size) = pack.read_info(&variant_oid).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(size, variant.len() as u64);
    }

    #[test]
    fn read_all_streams_without_index() {
        let dir = tempfile::tempdir().unwrap();
        let objects = sample_objects();
        let (pack_path, idx_path, _) = create_pack(dir.path(), "test", &objects).unwrap();
        std::fs::remove_file(idx_path).unwrap();

        let all = read_all(&pack_path).unwrap();
        assert_eq!(all.len(), 3);
        for (kind, data) in &objects {
            assert!(all.iter().any(|o| o.kind == *kind && &o.data == data));
        }
    }

    #[test]
    fn read_all_resolves_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let base: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        let mut variant = base.clone();
        variant.extend_from_slice(b"suffix");

        let objects = vec![
            (ObjectKind::Blob, base.clone()),
            (ObjectKind::Blob, variant.clone()),
        ];
        let (pack_path, _, _) = create_pack(dir.path(), "delta", &objects).unwrap();

        let all = read_all(&pack_path).unwrap();
        assert!(all.iter().any(|o| o.data == variant));
    }

    #[test]
    fn corrupt_trailer_detected() {
        let dir = tempfile::tempdir().unwrap();
        let (pack_path, _, _) = create_pack(dir.path(), "test", &sample_objects()).unwrap();

        let mut data = std::fs::read(&pack_path).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xff;
        std::fs::write(&pack_path, &data).unwrap();

        assert!(matches!(
            read_all(&pack_path),
            Err(PackError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn verify_passes_on_good_pack() {
        let dir = tempfile::tempdir().unwrap();
        let (pack_path, _, _) = create_pack(dir.path(), "test", &sample_objects()).unwrap();
        PackFile::open(&pack_path).unwrap().verify().unwrap();
    }

    #[test]
    fn missing_delta_base_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("thin.pack");

        let ghost = ObjectId([0x33; 32]);
        let delta = crate::delta::compute_delta(b"ghost base", b"target body");

        let mut writer = PackWriter::new(&pack_path).unwrap();
        writer
            .add_delta(ghost, ObjectId([0x44; 32]), ObjectKind::Blob, 11, &delta)
            .unwrap();
        let mut finished = writer.finish().unwrap();
        finished.write_index().unwrap();

        let pack = PackFile::open(&pack_path).unwrap();
        assert!(matches!(
            pack.read_at_offset(PACK_HEADER_SIZE as u64),
            Err(PackError::MissingBase(oid)) if oid == ghost
        ));

        assert!(matches!(
            read_all(&pack_path),
            Err(PackError::MissingBase(_))
        ));
    }

    #[test]
    fn bad_signature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.pack");
        std::fs::write(&path, b"JUNKJUNKJUNKJUNK").unwrap();
        assert!(matches!(
            read_all(&path),
            Err(PackError::InvalidHeader(_))
        ));
    }
}
