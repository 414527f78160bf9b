use std::fs;
use std::path::Path;

use vec_hash::{Hasher, ObjectId};
use vec_object::{header, Object, ObjectKind};

use crate::{LooseError, LooseObjectStore};

impl LooseObjectStore {
    /// Write an object to the loose store. Returns the OID.
    ///
    /// No-op if the object already exists: the address is the content hash,
    /// so an existing file is guaranteed byte-identical.
    /// The file is written atomically (temp file + rename).
    pub fn write(&self, obj: &Object) -> Result<ObjectId, LooseError> {
        let content = obj.serialize_content();
        self.write_raw(obj.kind(), &content)
    }

    /// Write raw content bytes with a known kind. Returns the OID.
    pub fn write_raw(&self, kind: ObjectKind, content: &[u8]) -> Result<ObjectId, LooseError> {
        let hdr = header::write_header(kind, content.len());

        let oid = {
            let mut hasher = Hasher::new();
            hasher.update(&hdr);
            hasher.update(content);
            hasher.finalize()
        };

        if self.contains(&oid) {
            return Ok(oid);
        }

        let final_path = self.object_path(&oid);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Temp file in the objects dir so the rename stays on one filesystem.
        let tmp_path = write_to_temp(self.objects_dir(), &hdr, content)?;
        finalize_object(&tmp_path, &final_path)?;

        Ok(oid)
    }
}

/// Write header + content into a uniquely named temp file under `objects_dir`.
fn write_to_temp(
    objects_dir: &Path,
    hdr: &[u8],
    content: &[u8],
) -> Result<std::path::PathBuf, LooseError> {
    let tmp_path = objects_dir.join(format!(
        "tmp_obj_{}",
        std::process::id()
            ^ std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos()
    ));

    let mut data = Vec::with_capacity(hdr.len() + content.len());
    data.extend_from_slice(hdr);
    data.extend_from_slice(content);
    fs::write(&tmp_path, &data)?;

    Ok(tmp_path)
}

/// Atomically move a temp file to its final destination.
///
/// If the destination already exists (race with another writer), the temp
/// file is removed and the write is treated as successful.
fn finalize_object(tmp: &Path, final_path: &Path) -> Result<(), LooseError> {
    match fs::rename(tmp, final_path) {
        Ok(()) => Ok(()),
        Err(_) if final_path.exists() => {
            let _ = fs::remove_file(tmp);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(tmp);
            Err(LooseError::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vec_object::Blob;

    #[test]
    fn write_blob_and_path_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::open(dir.path());

        let oid = store.write_raw(ObjectKind::Blob, b"hello\n").unwrap();
        let path = store.object_path(&oid);
        assert!(path.is_file());

        let on_disk = fs::read(&path).unwrap();
        assert_eq!(&on_disk[..7], b"blob 6\0");
        assert_eq!(&on_disk[7..], b"hello\n");
    }

    #[test]
    fn write_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::open(dir.path());

        let first = store.write_raw(ObjectKind::Blob, b"same").unwrap();
        let second = store.write_raw(ObjectKind::Blob, b"same").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn oid_matches_typed_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::open(dir.path());

        let oid = store.write(&Object::Blob(Blob::new(b"x".to_vec()))).unwrap();
        assert_eq!(oid, Hasher::digest(b"blob 1\0x"));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::open(dir.path());
        store.write_raw(ObjectKind::Blob, b"content").unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("tmp_obj_"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
