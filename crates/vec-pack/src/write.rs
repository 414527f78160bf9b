//! Pack generation: create .pack files and their VIDX indexes.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use vec_hash::{Hasher, ObjectId};
use vec_object::ObjectKind;

use crate::delta::compute_delta;
use crate::entry::encode_entry_header;
use crate::index::{write_pack_index, IndexEntry};
use crate::{kind_number, PackError, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION};

/// Candidate screening: length of the prefix sample compared byte-wise.
const SAMPLE_LEN: usize = 64;

/// Candidate screening: sizes must be within this ratio of each other.
const SIZE_RATIO: usize = 3;

/// Builder for creating new packfiles.
///
/// Objects added through [`add`](PackWriter::add) are considered for delta
/// compression against previously added objects of the same kind; a delta
/// is kept only when it is strictly smaller than 3/4 of the raw size.
pub struct PackWriter {
    file: std::fs::File,
    path: PathBuf,
    num_objects: u32,
    entries: Vec<IndexEntry>,
    seen: HashSet<ObjectId>,
    /// Previously added objects, kept raw as delta base candidates.
    window: Vec<(ObjectId, ObjectKind, Vec<u8>)>,
    /// Current write position (byte offset).
    position: u64,
}

/// A completed pack, ready for index generation.
pub struct FinishedPack {
    pub path: PathBuf,
    pub checksum: ObjectId,
    entries: Vec<IndexEntry>,
}

impl PackWriter {
    /// Create a new pack writer at the given path.
    ///
    /// Writes a placeholder header immediately; `finish` patches the object
    /// count and appends the checksum trailer.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PackError> {
        let path = path.as_ref().to_path_buf();
        let mut file = std::fs::File::create(&path)?;

        let mut header = [0u8; PACK_HEADER_SIZE];
        header[0..4].copy_from_slice(PACK_SIGNATURE);
        header[4..8].copy_from_slice(&PACK_VERSION.to_be_bytes());
        header[8..12].copy_from_slice(&0u32.to_be_bytes());
        file.write_all(&header)?;

        Ok(Self {
            file,
            path,
            num_objects: 0,
            entries: Vec::new(),
            seen: HashSet::new(),
            window: Vec::new(),
            position: PACK_HEADER_SIZE as u64,
        })
    }

    /// Add an object, choosing delta or full encoding automatically.
    ///
    /// Duplicate objects (same content hash) are skipped. Returns the OID.
    pub fn add(&mut self, kind: ObjectKind, data: &[u8]) -> Result<ObjectId, PackError> {
        let oid = Hasher::hash_object(kind.as_str(), data);
        if self.seen.contains(&oid) {
            return Ok(oid);
        }

        match self.pick_delta_base(kind, data) {
            Some((base_oid, delta)) => {
                self.write_delta_record(base_oid, oid, kind, data.len() as u64, &delta)?
            }
            None => self.write_full_record(oid, kind, data)?,
        }

        self.window.push((oid, kind, data.to_vec()));
        Ok(oid)
    }

    /// Add a full (non-delta) object record.
    pub fn add_object(&mut self, kind: ObjectKind, data: &[u8]) -> Result<ObjectId, PackError> {
        let oid = Hasher::hash_object(kind.as_str(), data);
        if self.seen.contains(&oid) {
            return Ok(oid);
        }
        self.write_full_record(oid, kind, data)?;
        self.window.push((oid, kind, data.to_vec()));
        Ok(oid)
    }

    /// Add a delta record against a base already present in this pack.
    ///
    /// `raw_size` is the size of the fully materialized target object and is
    /// recorded in the index.
    pub fn add_delta(
        &mut self,
        base_oid: ObjectId,
        target_oid: ObjectId,
        kind: ObjectKind,
        raw_size: u64,
        delta: &[u8],
    ) -> Result<(), PackError> {
        self.write_delta_record(base_oid, target_oid, kind, raw_size, delta)
    }

    /// Objects written so far.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Finish writing: patch the header count and append the SHA-256 trailer.
    pub fn finish(mut self) -> Result<FinishedPack, PackError> {
        use std::io::Seek;

        self.file.seek(std::io::SeekFrom::Start(0))?;
        let mut header = [0u8; PACK_HEADER_SIZE];
        header[0..4].copy_from_slice(PACK_SIGNATURE);
        header[4..8].copy_from_slice(&PACK_VERSION.to_be_bytes());
        header[8..12].copy_from_slice(&self.num_objects.to_be_bytes());
        self.file.write_all(&header)?;
        self.file.sync_all()?;
        drop(self.file);

        // The header was patched after the fact, so hash the file as written.
        let pack_content = std::fs::read(&self.path)?;
        let checksum = Hasher::digest(&pack_content);

        let mut file = std::fs::OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(checksum.as_bytes())?;
        file.sync_all()?;

        Ok(FinishedPack {
            path: self.path,
            checksum,
            entries: self.entries,
        })
    }

    /// Search the window for the best delta base per the selection rule:
    /// same kind, size within a 1:3 ratio, equal prefix sample, and a delta
    /// strictly smaller than 3/4 of the raw size.
    fn pick_delta_base(&self, kind: ObjectKind, data: &[u8]) -> Option<(ObjectId, Vec<u8>)> {
        let mut best: Option<(ObjectId, Vec<u8>)> = None;
        let limit = data.len() * 3 / 4;

        for (base_oid, base_kind, base_data) in &self.window {
            if *base_kind != kind || !sizes_comparable(base_data.len(), data.len()) {
                continue;
            }
            let sample = SAMPLE_LEN.min(base_data.len()).min(data.len());
            if base_data[..sample] != data[..sample] {
                continue;
            }

            let delta = compute_delta(base_data, data);
            if delta.len() >= limit {
                continue;
            }
            let improves = match &best {
                Some((_, prev)) => delta.len() < prev.len(),
                None => true,
            };
            if improves {
                best = Some((*base_oid, delta));
            }
        }

        best
    }

    fn write_full_record(
        &mut self,
        oid: ObjectId,
        kind: ObjectKind,
        data: &[u8],
    ) -> Result<(), PackError> {
        let offset = self.position;
        let header = encode_entry_header(kind_number(kind), data.len() as u64);
        let compressed = compress(data)?;

        self.write_bytes(&header)?;
        self.write_bytes(&compressed)?;
        self.record_entry(oid, offset, kind, data.len() as u64);
        Ok(())
    }

    fn write_delta_record(
        &mut self,
        base_oid: ObjectId,
        target_oid: ObjectId,
        kind: ObjectKind,
        raw_size: u64,
        delta: &[u8],
    ) -> Result<(), PackError> {
        let offset = self.position;
        let header = encode_entry_header(4, delta.len() as u64);
        let compressed = compress(delta)?;

        self.write_bytes(&header)?;
        self.write_bytes(base_oid.to_hex().as_bytes())?;
        self.write_bytes(&compressed)?;
        self.record_entry(target_oid, offset, kind, raw_size);
        Ok(())
    }

    fn record_entry(&mut self, oid: ObjectId, offset: u64, kind: ObjectKind, size: u64) {
        self.entries.push(IndexEntry {
            oid,
            offset,
            kind,
            size,
        });
        self.seen.insert(oid);
        self.num_objects += 1;
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), PackError> {
        self.file.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }
}

impl FinishedPack {
    /// Write the VIDX companion next to the pack (same stem, `.idx`).
    pub fn write_index(&mut self) -> Result<PathBuf, PackError> {
        let idx_path = self.path.with_extension("idx");
        write_pack_index(&idx_path, &mut self.entries, &self.checksum)
    }

    /// The index entries for this pack, in write order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>, PackError> {
    let mut out = Vec::new();
    let mut encoder = ZlibEncoder::new(&mut out, Compression::default());
    encoder.write_all(data)?;
    encoder.finish()?;
    Ok(out)
}

fn sizes_comparable(a: usize, b: usize) -> bool {
    let (small, large) = if a < b { (a, b) } else { (b, a) };
    large <= small.saturating_mul(SIZE_RATIO)
}

/// Convenience: create a pack and its index from a set of objects.
///
/// Returns `(pack_path, idx_path, checksum)`.
pub fn create_pack(
    dir: &Path,
    name: &str,
    objects: &[(ObjectKind, Vec<u8>)],
) -> Result<(PathBuf, PathBuf, ObjectId), PackError> {
    let pack_path = dir.join(format!("{name}.pack"));

    let mut writer = PackWriter::new(&pack_path)?;
    for (kind, data) in objects {
        writer.add(*kind, data)?;
    }

    let mut finished = writer.finish()?;
    let idx_path = finished.write_index()?;
    Ok((pack_path, idx_path, finished.checksum))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_comparable_ratio() {
        assert!(sizes_comparable(100, 300));
        assert!(sizes_comparable(300, 100));
        assert!(!sizes_comparable(100, 301));
        assert!(sizes_comparable(0, 0));
    }

    #[test]
    fn header_patched_with_count() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("p.pack");
        let mut writer = PackWriter::new(&pack_path).unwrap();
        writer.add(ObjectKind::Blob, b"one").unwrap();
        writer.add(ObjectKind::Blob, b"two").unwrap();
        let finished = writer.finish().unwrap();

        let data = std::fs::read(&finished.path).unwrap();
        assert_eq!(&data[0..4], PACK_SIGNATURE);
        assert_eq!(u32::from_be_bytes(data[4..8].try_into().unwrap()), 2);
        assert_eq!(u32::from_be_bytes(data[8..12].try_into().unwrap()), 2);
    }

    #[test]
    fn trailer_is_hash_of_preceding_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("p.pack");
        let mut writer = PackWriter::new(&pack_path).unwrap();
        writer.add(ObjectKind::Blob, b"payload").unwrap();
        let finished = writer.finish().unwrap();

        let data = std::fs::read(&finished.path).unwrap();
        let body = &data[..data.len() - 32];
        let trailer = &data[data.len() - 32..];
        assert_eq!(Hasher::digest(body).as_bytes(), trailer);
        assert_eq!(finished.checksum.as_bytes(), trailer);
    }

    #[test]
    fn duplicate_objects_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("p.pack");
        let mut writer = PackWriter::new(&pack_path).unwrap();
        let a = writer.add(ObjectKind::Blob, b"same bytes").unwrap();
        let b = writer.add(ObjectKind::Blob, b"same bytes").unwrap();
        assert_eq!(a, b);
        assert_eq!(writer.num_objects(), 1);
    }

    #[test]
    fn near_duplicates_become_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("p.pack");

        let base: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
        let mut variant = base.clone();
        variant.extend_from_slice(b"tail change");

        let mut writer = PackWriter::new(&pack_path).unwrap();
        writer.add(ObjectKind::Blob, &base).unwrap();
        writer.add(ObjectKind::Blob, &variant).unwrap();
        let finished = writer.finish().unwrap();

        // Both entries resolve to blobs with their raw sizes in the index.
        assert_eq!(finished.entries().len(), 2);
        assert_eq!(finished.entries()[1].size, variant.len() as u64);

        // The second record is a delta: the pack is much smaller than the
        // two raw payloads compressed independently would allow.
        let pack_size = std::fs::metadata(&finished.path).unwrap().len();
        assert!(pack_size < (base.len() + variant.len()) as u64);
    }

    #[test]
    fn dissimilar_objects_stay_full() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("p.pack");

        let mut writer = PackWriter::new(&pack_path).unwrap();
        writer.add(ObjectKind::Blob, &[0xaa; 500]).unwrap();
        // Different prefix: fails the sample screen.
        writer.add(ObjectKind::Blob, &[0xbb; 500]).unwrap();
        let finished = writer.finish().unwrap();
        assert_eq!(finished.entries().len(), 2);
    }
}
