//! Uncommitted-change detection: index vs HEAD tree vs working tree.

use std::collections::BTreeMap;
use std::path::Path;

use bstr::{BStr, ByteSlice};
use vec_hash::{Hasher, ObjectId};
use vec_odb::ObjectDatabase;

use crate::{Index, IndexError, Stage};

/// Whether the stage-0 index matches the flattened HEAD tree exactly
/// (same paths, same blob OIDs).
pub fn head_matches_index(
    index: &Index,
    odb: &ObjectDatabase,
    head_tree: Option<&ObjectId>,
) -> Result<bool, IndexError> {
    let head_flat = match head_tree {
        Some(tree) => odb.flatten_tree(tree)?,
        None => BTreeMap::new(),
    };

    let stage0: Vec<_> = index
        .entries()
        .iter()
        .filter(|e| e.stage == Stage::Normal)
        .collect();

    if stage0.len() != head_flat.len() {
        return Ok(false);
    }
    for entry in stage0 {
        match head_flat.get(entry.path.as_bstr()) {
            Some(flat) if flat.oid == entry.oid => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// Whether anything would go into a commit that HEAD does not already have,
/// or the working tree has drifted from the index.
///
/// True if either:
/// (a) the stage-0 index differs from the flattened HEAD tree (a path was
///     added, removed, or its blob OID changed); or
/// (b) some stage-0 path's working file content no longer hashes to the
///     indexed OID. Files whose mtime is at or before the indexed mtime are
///     trusted unchanged; only newer files are re-hashed.
pub fn has_uncommitted_changes(
    index: &Index,
    odb: &ObjectDatabase,
    head_tree: Option<&ObjectId>,
    work_tree: &Path,
) -> Result<bool, IndexError> {
    if !head_matches_index(index, odb, head_tree)? {
        return Ok(true);
    }

    for entry in index.entries() {
        if entry.stage != Stage::Normal {
            continue;
        }
        if working_file_changed(entry.path.as_bstr(), entry, work_tree)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn working_file_changed(
    path: &BStr,
    entry: &crate::IndexEntry,
    work_tree: &Path,
) -> Result<bool, IndexError> {
    let fs_path = work_tree.join(path.to_str_lossy().as_ref());

    let meta = match std::fs::metadata(&fs_path) {
        Ok(meta) => meta,
        // A staged path with no working file is a pending deletion.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(IndexError::Io(e)),
    };

    if meta.len() as i64 != entry.size {
        return Ok(true);
    }

    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(i64::MAX);
    if mtime <= entry.mtime {
        return Ok(false);
    }

    // Stale stat data; fall back to content.
    let content = std::fs::read(&fs_path)?;
    Ok(Hasher::hash_object("blob", &content) != entry.oid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vec_object::{FileMode, ObjectKind};

    struct Fixture {
        _dir: tempfile::TempDir,
        odb: ObjectDatabase,
        work_tree: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let objects = dir.path().join("objects");
        std::fs::create_dir_all(&objects).unwrap();
        let work_tree = dir.path().join("wt");
        std::fs::create_dir_all(&work_tree).unwrap();
        Fixture {
            odb: ObjectDatabase::open(&objects).unwrap(),
            work_tree,
            _dir: dir,
        }
    }

    /// Stage `content` at `path`, writing both blob and working file.
    fn stage(fx: &Fixture, index: &mut Index, path: &str, content: &[u8]) -> ObjectId {
        let fs_path = fx.work_tree.join(path);
        if let Some(parent) = fs_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&fs_path, content).unwrap();
        let oid = fx.odb.write_raw(ObjectKind::Blob, content).unwrap();
        index
            .add(path, oid, FileMode::Regular, &fx.work_tree)
            .unwrap();
        oid
    }

    #[test]
    fn empty_index_empty_head_is_clean() {
        let fx = fixture();
        let index = Index::new();
        assert!(!index
            .has_uncommitted_changes(&fx.odb, None, &fx.work_tree)
            .unwrap());
    }

    #[test]
    fn staged_file_not_in_head_is_dirty() {
        let fx = fixture();
        let mut index = Index::new();
        stage(&fx, &mut index, "new.txt", b"fresh");

        assert!(index
            .has_uncommitted_changes(&fx.odb, None, &fx.work_tree)
            .unwrap());
    }

    #[test]
    fn index_matching_head_is_clean() {
        let fx = fixture();
        let mut index = Index::new();
        stage(&fx, &mut index, "file.txt", b"stable");

        let head_tree = index.write_tree(&fx.odb).unwrap();
        assert!(!index
            .has_uncommitted_changes(&fx.odb, Some(&head_tree), &fx.work_tree)
            .unwrap());
    }

    #[test]
    fn path_removed_from_index_is_dirty() {
        let fx = fixture();
        let mut index = Index::new();
        stage(&fx, &mut index, "file.txt", b"stable");
        let head_tree = index.write_tree(&fx.odb).unwrap();

        index.remove(BStr::new("file.txt"));
        assert!(index
            .has_uncommitted_changes(&fx.odb, Some(&head_tree), &fx.work_tree)
            .unwrap());
    }

    #[test]
    fn deleted_working_file_is_dirty() {
        let fx = fixture();
        let mut index = Index::new();
        stage(&fx, &mut index, "file.txt", b"stable");
        let head_tree = index.write_tree(&fx.odb).unwrap();

        std::fs::remove_file(fx.work_tree.join("file.txt")).unwrap();
        assert!(index
            .has_uncommitted_changes(&fx.odb, Some(&head_tree), &fx.work_tree)
            .unwrap());
    }

    #[test]
    fn modified_working_file_is_dirty() {
        let fx = fixture();
        let mut index = Index::new();
        stage(&fx, &mut index, "file.txt", b"original");
        let head_tree = index.write_tree(&fx.odb).unwrap();

        // Same length, different bytes, mtime bumped past the indexed one.
        std::fs::write(fx.work_tree.join("file.txt"), b"ORIGINAL").unwrap();
        let future = std::time::SystemTime::now() + std::time::Duration::from_secs(10);
        let file = std::fs::File::options()
            .write(true)
            .open(fx.work_tree.join("file.txt"))
            .unwrap();
        file.set_modified(future).unwrap();

        assert!(index
            .has_uncommitted_changes(&fx.odb, Some(&head_tree), &fx.work_tree)
            .unwrap());
    }

    #[test]
    fn head_matches_index_detects_oid_change() {
        let fx = fixture();
        let mut index = Index::new();
        stage(&fx, &mut index, "file.txt", b"v1");
        let head_tree = index.write_tree(&fx.odb).unwrap();
        assert!(head_matches_index(&index, &fx.odb, Some(&head_tree)).unwrap());

        stage(&fx, &mut index, "file.txt", b"v2");
        assert!(!head_matches_index(&index, &fx.odb, Some(&head_tree)).unwrap());
    }
}
