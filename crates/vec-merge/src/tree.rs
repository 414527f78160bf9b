//! Three-way tree reconciliation.
//!
//! Flattens the base, ours, and theirs trees and decides every path in
//! their union. The working tree and index both start out equal to the
//! "ours" tree (merge preconditions guarantee a clean tree), so rows whose
//! result is the ours side need no action; rows taking the theirs side
//! write through the index and working tree.

use std::collections::BTreeSet;

use bstr::{BStr, BString, ByteSlice};
use vec_hash::ObjectId;
use vec_index::Index;
use vec_odb::FlatEntry;
use vec_repository::Repository;

use crate::conflict::{record_clean_merge, record_conflict_in_index, write_conflict_worktree};
use crate::content::{self, ContentMergeResult, MergeLabels};
use crate::{
    ConflictEntry, ConflictKind, ConflictSide, MergeError, MergeOptions, Strategy,
};

/// Outcome of reconciling the three trees. The index and working tree have
/// been updated; conflicted paths carry stages 1-3 instead of stage 0.
#[derive(Debug, Default)]
pub struct TreeMergeResult {
    pub conflicts: Vec<ConflictEntry>,
}

impl TreeMergeResult {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Merge `theirs` into `ours` against `base`, applying results to the
/// index and working tree.
pub fn merge_trees(
    repo: &Repository,
    index: &mut Index,
    base_tree: &ObjectId,
    ours_tree: &ObjectId,
    theirs_tree: &ObjectId,
    options: &MergeOptions,
) -> Result<TreeMergeResult, MergeError> {
    let base = repo.odb().flatten_tree(base_tree)?;
    let ours = repo.odb().flatten_tree(ours_tree)?;
    let theirs = repo.odb().flatten_tree(theirs_tree)?;

    let mut paths: BTreeSet<&BStr> = BTreeSet::new();
    paths.extend(base.keys().map(|p| p.as_bstr()));
    paths.extend(ours.keys().map(|p| p.as_bstr()));
    paths.extend(theirs.keys().map(|p| p.as_bstr()));

    let mut result = TreeMergeResult::default();

    for path in paths {
        let b = base.get(path).copied();
        let o = ours.get(path).copied();
        let t = theirs.get(path).copied();

        merge_path(repo, index, path, b, o, t, options, &mut result)?;
    }

    Ok(result)
}

/// Decide one path of the union.
#[allow(clippy::too_many_arguments)]
fn merge_path(
    repo: &Repository,
    index: &mut Index,
    path: &BStr,
    b: Option<FlatEntry>,
    o: Option<FlatEntry>,
    t: Option<FlatEntry>,
    options: &MergeOptions,
    result: &mut TreeMergeResult,
) -> Result<(), MergeError> {
    let same = |x: &Option<FlatEntry>, y: &Option<FlatEntry>| -> bool {
        match (x, y) {
            (Some(a), Some(b)) => a.oid == b.oid,
            (None, None) => true,
            _ => false,
        }
    };

    // Nothing diverged, or both sides agree: the ours side already in the
    // index and working tree is the answer.
    if same(&o, &t) {
        return Ok(());
    }
    // Only theirs diverged from base: take theirs.
    if same(&o, &b) {
        return match t {
            Some(theirs) => take_theirs(repo, index, path, theirs),
            None => delete_path(repo, index, path),
        };
    }
    // Only ours diverged from base: keep ours.
    if same(&t, &b) {
        return Ok(());
    }

    // Both sides diverged from base in different ways.
    match (b, o, t) {
        // Modify vs delete.
        (Some(base), Some(ours), None) => {
            // Strategy selection collapses the conflict to one side.
            match options.strategy {
                Strategy::Ours => Ok(()),
                Strategy::Theirs => delete_path(repo, index, path),
                Strategy::Recursive => record_modify_delete(
                    repo,
                    index,
                    path,
                    Some(base),
                    Some(ours),
                    None,
                    result,
                ),
            }
        }
        (Some(base), None, Some(theirs)) => match options.strategy {
            Strategy::Ours => Ok(()),
            Strategy::Theirs => take_theirs(repo, index, path, theirs),
            Strategy::Recursive => record_modify_delete(
                repo,
                index,
                path,
                Some(base),
                None,
                Some(theirs),
                result,
            ),
        },

        // Content divergence: present on both sides.
        (base, Some(ours), Some(theirs)) => {
            let kind = if base.is_some() {
                ConflictKind::Content
            } else {
                ConflictKind::AddAdd
            };
            match options.strategy {
                Strategy::Ours => Ok(()),
                Strategy::Theirs => take_theirs(repo, index, path, theirs),
                Strategy::Recursive => {
                    content_merge(repo, index, path, base, ours, theirs, kind, options, result)
                }
            }
        }

        // Remaining rows have at most one side present and were handled by
        // the agreement checks above.
        _ => Ok(()),
    }
}

/// Take the theirs side: write the blob into the working tree and stage it.
fn take_theirs(
    repo: &Repository,
    index: &mut Index,
    path: &BStr,
    theirs: FlatEntry,
) -> Result<(), MergeError> {
    let blob = repo.odb().read_blob(&theirs.oid)?;
    record_clean_merge(repo, index, path, &blob.data, theirs.mode)?;
    Ok(())
}

/// Remove the path from index and working tree.
fn delete_path(repo: &Repository, index: &mut Index, path: &BStr) -> Result<(), MergeError> {
    index.remove(path);
    let fs_path = repo.work_tree().join(path.to_str_lossy().as_ref());
    match std::fs::remove_file(&fs_path) {
        Ok(()) => {
            prune_empty_dirs(repo, fs_path.parent());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MergeError::Io(e)),
    }
}

fn prune_empty_dirs(repo: &Repository, mut dir: Option<&std::path::Path>) {
    while let Some(d) = dir {
        if d == repo.work_tree() || std::fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

/// Record a modify/delete conflict.
fn record_modify_delete(
    repo: &Repository,
    index: &mut Index,
    path: &BStr,
    base: Option<FlatEntry>,
    ours: Option<FlatEntry>,
    theirs: Option<FlatEntry>,
    result: &mut TreeMergeResult,
) -> Result<(), MergeError> {
    let conflict = ConflictEntry {
        path: BString::from(path),
        kind: ConflictKind::ModifyDelete,
        base: base.map(to_side),
        ours: ours.map(to_side),
        theirs: theirs.map(to_side),
    };
    record_conflict_in_index(index, &conflict)?;
    write_conflict_worktree(repo, &conflict, None)?;
    result.conflicts.push(conflict);
    Ok(())
}

/// Merge file content for a path both sides changed.
#[allow(clippy::too_many_arguments)]
fn content_merge(
    repo: &Repository,
    index: &mut Index,
    path: &BStr,
    base: Option<FlatEntry>,
    ours: FlatEntry,
    theirs: FlatEntry,
    kind: ConflictKind,
    options: &MergeOptions,
    result: &mut TreeMergeResult,
) -> Result<(), MergeError> {
    let base_data = match base {
        Some(entry) => repo.odb().read_blob(&entry.oid)?.data,
        None => Vec::new(),
    };
    let ours_data = repo.odb().read_blob(&ours.oid)?.data;
    let theirs_data = repo.odb().read_blob(&theirs.oid)?.data;

    // NUL in any version escalates to a binary conflict.
    if content::is_binary(&base_data)
        || content::is_binary(&ours_data)
        || content::is_binary(&theirs_data)
    {
        let conflict = ConflictEntry {
            path: BString::from(path),
            kind: ConflictKind::Binary,
            base: base.map(to_side),
            ours: Some(to_side(ours)),
            theirs: Some(to_side(theirs)),
        };
        record_conflict_in_index(index, &conflict)?;
        write_conflict_worktree(repo, &conflict, None)?;
        result.conflicts.push(conflict);
        return Ok(());
    }

    let base_text = content::normalize_crlf(&base_data);
    let ours_text = content::normalize_crlf(&ours_data);
    let theirs_text = content::normalize_crlf(&theirs_data);

    let merged = content::merge_content(
        &base_text,
        &ours_text,
        &theirs_text,
        options.conflict_style,
        &MergeLabels::default(),
    );

    match merged {
        ContentMergeResult::Clean(content) => {
            record_clean_merge(repo, index, path, &content, ours.mode)?;
            Ok(())
        }
        ContentMergeResult::Conflict { content, .. } => {
            let conflict = ConflictEntry {
                path: BString::from(path),
                kind,
                base: base.map(to_side),
                ours: Some(to_side(ours)),
                theirs: Some(to_side(theirs)),
            };
            record_conflict_in_index(index, &conflict)?;
            write_conflict_worktree(repo, &conflict, Some(&content))?;
            result.conflicts.push(conflict);
            Ok(())
        }
    }
}

fn to_side(entry: FlatEntry) -> ConflictSide {
    ConflictSide {
        oid: entry.oid,
        mode: entry.mode,
    }
}
