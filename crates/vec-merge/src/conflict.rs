//! Conflict recording in the index and working tree.
//!
//! When a merge cannot resolve a path, the stage-0 entry is removed and
//! stages 1 (base), 2 (ours), 3 (theirs) are written for the sides that
//! exist, each carrying the full base/our/their OID triple. The working
//! tree receives marker-laden text for content conflicts, or sibling
//! `.ours`/`.theirs` files plus a one-line notice for conflicts with no
//! textual merge (binary files, modify/delete).

use std::path::PathBuf;

use bstr::{BStr, ByteSlice};
use vec_hash::ObjectId;
use vec_index::{Index, Stage};
use vec_object::FileMode;
use vec_repository::Repository;

use crate::{ConflictEntry, ConflictKind, MergeError};

/// Record a conflict's stages in the index.
///
/// Removes any stage-0 entry for the path first (a path never has both a
/// stage-0 entry and conflict stages).
pub fn record_conflict_in_index(
    index: &mut Index,
    conflict: &ConflictEntry,
) -> Result<(), MergeError> {
    index.remove(conflict.path.as_bstr());

    let base = conflict.base.map(|s| s.oid);
    let ours = conflict.ours.map(|s| s.oid);
    let theirs = conflict.theirs.map(|s| s.oid);

    for (side, stage) in [
        (conflict.base, Stage::Base),
        (conflict.ours, Stage::Ours),
        (conflict.theirs, Stage::Theirs),
    ] {
        if let Some(side) = side {
            index.add_conflict(
                conflict.path.clone(),
                side.oid,
                side.mode,
                stage,
                base,
                ours,
                theirs,
            )?;
        }
    }

    Ok(())
}

/// Write the working-tree files for a conflict.
///
/// Content conflicts receive the marker text at the path. Binary and
/// modify/delete conflicts receive `.ours`/`.theirs` siblings for the
/// sides that exist and a one-line notice at the path itself.
pub fn write_conflict_worktree(
    repo: &Repository,
    conflict: &ConflictEntry,
    marker_text: Option<&[u8]>,
) -> Result<(), MergeError> {
    let fs_path = work_path(repo, conflict.path.as_bstr());
    if let Some(parent) = fs_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match conflict.kind {
        ConflictKind::Content | ConflictKind::AddAdd => {
            let text = marker_text.unwrap_or_default();
            std::fs::write(&fs_path, text)?;
        }
        ConflictKind::Binary | ConflictKind::ModifyDelete => {
            let mut siblings: Vec<String> = Vec::new();
            if let Some(ours) = conflict.ours {
                let sibling = sibling_path(&fs_path, "ours");
                write_blob_to(repo, &ours.oid, &sibling)?;
                siblings.push(sibling_name(conflict.path.as_bstr(), "ours"));
            }
            if let Some(theirs) = conflict.theirs {
                let sibling = sibling_path(&fs_path, "theirs");
                write_blob_to(repo, &theirs.oid, &sibling)?;
                siblings.push(sibling_name(conflict.path.as_bstr(), "theirs"));
            }

            let what = match conflict.kind {
                ConflictKind::Binary => "binary conflict",
                _ => "modify/delete conflict",
            };
            let notice = format!("{what}: merged versions left in {}\n", siblings.join(" and "));
            std::fs::write(&fs_path, notice)?;
        }
    }

    Ok(())
}

/// Write clean merged content to the working tree and stage it.
pub fn record_clean_merge(
    repo: &Repository,
    index: &mut Index,
    path: &BStr,
    content: &[u8],
    mode: FileMode,
) -> Result<ObjectId, MergeError> {
    let oid = repo
        .odb()
        .write_raw(vec_object::ObjectKind::Blob, content)?;

    let fs_path = work_path(repo, path);
    if let Some(parent) = fs_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&fs_path, content)?;

    index.add(path, oid, mode, repo.work_tree())?;
    Ok(oid)
}

/// Replace a path's conflict stages with a resolved stage-0 entry.
pub fn resolve_conflict(
    repo: &Repository,
    index: &mut Index,
    path: &BStr,
    oid: ObjectId,
    mode: FileMode,
) -> Result<(), MergeError> {
    index.add(path, oid, mode, repo.work_tree())?;
    Ok(())
}

fn work_path(repo: &Repository, path: &BStr) -> PathBuf {
    repo.work_tree().join(path.to_str_lossy().as_ref())
}

fn sibling_path(fs_path: &std::path::Path, suffix: &str) -> PathBuf {
    let mut name = fs_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push('.');
    name.push_str(suffix);
    fs_path.with_file_name(name)
}

fn sibling_name(path: &BStr, suffix: &str) -> String {
    format!("{}.{}", path.to_str_lossy(), suffix)
}

fn write_blob_to(
    repo: &Repository,
    oid: &ObjectId,
    fs_path: &std::path::Path,
) -> Result<(), MergeError> {
    let blob = repo.odb().read_blob(oid)?;
    std::fs::write(fs_path, &blob.data)?;
    Ok(())
}
