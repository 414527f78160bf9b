//! Index entry type.

use bstr::BString;
use vec_hash::ObjectId;
use vec_object::FileMode;

use crate::Stage;

/// A single entry in the index.
///
/// `size` and `mtime` cache the working file's stat data for fast
/// change detection; they are zero when no working file backed the entry
/// (conflict stages, entries staged from trees).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Forward-slash path relative to the repository root.
    pub path: BString,
    /// Blob OID staged for this path.
    pub oid: ObjectId,
    /// File mode.
    pub mode: FileMode,
    /// Merge stage.
    pub stage: Stage,
    /// Working file size in bytes at staging time.
    pub size: i64,
    /// Working file mtime (seconds since epoch) at staging time.
    pub mtime: i64,
    /// OID of the common ancestor version, when recorded by a merge.
    pub base_oid: Option<ObjectId>,
    /// OID of our side, when recorded by a merge.
    pub our_oid: Option<ObjectId>,
    /// OID of their side, when recorded by a merge.
    pub their_oid: Option<ObjectId>,
}

impl IndexEntry {
    /// A plain stage-0 entry with no stat or conflict data.
    pub fn new(path: impl Into<BString>, oid: ObjectId, mode: FileMode) -> Self {
        Self {
            path: path.into(),
            oid,
            mode,
            stage: Stage::Normal,
            size: 0,
            mtime: 0,
            base_oid: None,
            our_oid: None,
            their_oid: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_defaults() {
        let entry = IndexEntry::new("file.txt", ObjectId([1; 32]), FileMode::Regular);
        assert_eq!(entry.stage, Stage::Normal);
        assert_eq!(entry.size, 0);
        assert!(entry.base_oid.is_none());
        assert!(entry.our_oid.is_none());
        assert!(entry.their_oid.is_none());
    }
}
