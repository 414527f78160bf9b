//! Index file writing and tree construction.

use std::io::Write;
use std::path::Path;

use bstr::{BString, ByteSlice};
use vec_hash::ObjectId;
use vec_object::{FileMode, ObjectKind, Tree, TreeEntry};
use vec_odb::ObjectDatabase;

use crate::entry::IndexEntry;
use crate::{Index, IndexError, Stage};

/// Write the index to a file atomically using a lock file.
pub fn write_index(index: &Index, path: &Path) -> Result<(), IndexError> {
    let mut lock =
        vec_utils::LockFile::acquire(path).map_err(|_| IndexError::LockFailed {
            path: path.to_path_buf(),
        })?;

    let data = serialize_index(index);
    lock.write_all(&data)?;
    lock.commit().map_err(|_| IndexError::LockFailed {
        path: path.to_path_buf(),
    })?;

    Ok(())
}

/// Serialize the index to its big-endian on-disk layout.
///
/// Entries are already held in `(path, stage)` order.
fn serialize_index(index: &Index) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(index.len() as u32).to_be_bytes());

    for entry in index.entries() {
        write_entry(&mut buf, entry);
    }
    buf
}

fn write_entry(buf: &mut Vec<u8>, entry: &IndexEntry) {
    buf.extend_from_slice(&entry.mode.raw().to_be_bytes());
    buf.extend_from_slice(&(entry.path.len() as u32).to_be_bytes());
    buf.extend_from_slice(&entry.path);
    buf.extend_from_slice(entry.oid.as_bytes());
    buf.extend_from_slice(&entry.size.to_be_bytes());
    buf.extend_from_slice(&entry.mtime.to_be_bytes());
    buf.extend_from_slice(&entry.stage.as_u32().to_be_bytes());
    write_optional_oid(buf, entry.base_oid.as_ref());
    write_optional_oid(buf, entry.our_oid.as_ref());
    write_optional_oid(buf, entry.their_oid.as_ref());
}

fn write_optional_oid(buf: &mut Vec<u8>, oid: Option<&ObjectId>) {
    match oid {
        Some(oid) => {
            let hex = oid.to_hex();
            buf.extend_from_slice(&(hex.len() as u32).to_be_bytes());
            buf.extend_from_slice(hex.as_bytes());
        }
        None => buf.extend_from_slice(&0u32.to_be_bytes()),
    }
}

/// Create the tree hierarchy from the index's stage-0 entries.
///
/// Groups entries by directory and recursively writes sub-trees bottom-up.
/// An empty index produces the empty tree.
pub fn write_tree_from_index(
    index: &Index,
    odb: &ObjectDatabase,
) -> Result<ObjectId, IndexError> {
    let entries: Vec<&IndexEntry> = index
        .entries()
        .iter()
        .filter(|e| e.stage == Stage::Normal)
        .collect();

    build_tree(&entries, b"", odb)
}

/// Recursively build tree objects from sorted stage-0 entries.
///
/// `prefix` is the directory being built, with a trailing '/' unless root;
/// `entries` are exactly the index entries below that directory.
fn build_tree(
    entries: &[&IndexEntry],
    prefix: &[u8],
    odb: &ObjectDatabase,
) -> Result<ObjectId, IndexError> {
    let mut tree_entries: Vec<TreeEntry> = Vec::new();
    let mut i = 0;

    while i < entries.len() {
        let entry = entries[i];
        let rest = &entry.path[prefix.len()..];

        if let Some(slash_pos) = rest.find_byte(b'/') {
            // Subdirectory: collect the run of entries sharing the component.
            let dir_name = &rest[..slash_pos];
            let subtree_end = entries[i..]
                .iter()
                .position(|e| {
                    let p = &e.path[prefix.len()..];
                    !(p.starts_with(dir_name) && p.get(slash_pos) == Some(&b'/'))
                })
                .map(|pos| i + pos)
                .unwrap_or(entries.len());

            let mut new_prefix = prefix.to_vec();
            new_prefix.extend_from_slice(dir_name);
            new_prefix.push(b'/');

            let subtree_oid = build_tree(&entries[i..subtree_end], &new_prefix, odb)?;
            tree_entries.push(TreeEntry {
                mode: FileMode::Dir,
                name: BString::from(dir_name),
                oid: subtree_oid,
            });

            i = subtree_end;
        } else {
            tree_entries.push(TreeEntry {
                mode: entry.mode,
                name: BString::from(rest),
                oid: entry.oid,
            });
            i += 1;
        }
    }

    let mut tree = Tree {
        entries: tree_entries,
    };
    tree.sort();
    Ok(odb.write_raw(ObjectKind::Tree, &tree.serialize_content())?)
}
