//! Index (staging area).
//!
//! The index is a flat, sorted binary file mapping working-tree paths to
//! blob OIDs, with per-path merge stages. It sits between the working tree
//! and the object database, tracking what goes into the next commit and
//! carrying conflict state during an unresolved merge.

pub mod entry;
mod read;
mod status;
mod write;

use std::path::Path;

use bstr::BStr;
use vec_hash::ObjectId;
use vec_object::FileMode;
use vec_odb::ObjectDatabase;

pub use entry::IndexEntry;
pub use status::head_matches_index;

/// Errors from index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid index entry at offset {offset}: {reason}")]
    InvalidEntry { offset: usize, reason: String },

    #[error("truncated index: need {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("index entries out of order: '{prev}' before '{next}'")]
    OutOfOrder { prev: String, next: String },

    #[error("conflict entry for '{path}' must use stage 1-3, got {stage}")]
    InvalidConflictStage { path: String, stage: u32 },

    #[error("lock failed for {path}")]
    LockFailed { path: std::path::PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] vec_hash::HashError),

    #[error(transparent)]
    Odb(#[from] vec_odb::OdbError),
}

/// Merge stage of an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Merged/normal entry (stage 0).
    Normal,
    /// Common ancestor version during a conflict (stage 1).
    Base,
    /// Our side during a conflict (stage 2).
    Ours,
    /// Their side during a conflict (stage 3).
    Theirs,
}

impl Stage {
    pub fn as_u32(&self) -> u32 {
        match self {
            Stage::Normal => 0,
            Stage::Base => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    pub fn from_u32(n: u32) -> Option<Self> {
        match n {
            0 => Some(Stage::Normal),
            1 => Some(Stage::Base),
            2 => Some(Stage::Ours),
            3 => Some(Stage::Theirs),
            _ => None,
        }
    }
}

/// The staging index: entries sorted by `(path, stage)`.
///
/// Invariants maintained by every mutator:
/// - at most one entry per `(path, stage)`;
/// - a path has either a stage-0 entry or stage 1-3 entries, never both.
#[derive(Debug, Default)]
pub struct Index {
    entries: Vec<IndexEntry>,
}

impl Index {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Load the index from a file; a missing file is an empty index
    /// (the index is created lazily on first write).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        match std::fs::read(path.as_ref()) {
            Ok(data) => read::parse_index(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(IndexError::Io(e)),
        }
    }

    /// Write the index to a file atomically (lock file + rename).
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        write::write_index(self, path.as_ref())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the index empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in `(path, stage)` order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Get an entry by path and stage.
    pub fn get(&self, path: &BStr, stage: Stage) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|e| e.path[..] == path[..] && e.stage == stage)
    }

    /// Upsert a stage-0 entry, refreshing size/mtime from the working file.
    ///
    /// Clears any conflict stages and recorded base/our/their OIDs for the
    /// path: staging a file is how conflicts are resolved.
    pub fn add(
        &mut self,
        path: impl Into<bstr::BString>,
        oid: ObjectId,
        mode: FileMode,
        work_tree: &Path,
    ) -> Result<(), IndexError> {
        let path = path.into();
        let (size, mtime) = stat_working_file(work_tree, path.as_ref())?;

        self.remove_all_stages(path.as_ref());
        self.insert_sorted(IndexEntry {
            path,
            oid,
            mode,
            stage: Stage::Normal,
            size,
            mtime,
            base_oid: None,
            our_oid: None,
            their_oid: None,
        });
        Ok(())
    }

    /// Insert an already-built entry, replacing any existing `(path, stage)`.
    pub fn add_entry(&mut self, entry: IndexEntry) {
        self.entries
            .retain(|e| !(e.path == entry.path && e.stage == entry.stage));
        self.insert_sorted(entry);
    }

    /// Delete the stage-0 entry for `path`. Idempotent.
    pub fn remove(&mut self, path: &BStr) {
        self.entries
            .retain(|e| !(e.path[..] == path[..] && e.stage == Stage::Normal));
    }

    /// Delete every entry for `path`, at any stage. Idempotent.
    pub fn remove_all_stages(&mut self, path: &BStr) {
        self.entries.retain(|e| e.path[..] != path[..]);
    }

    /// Append a conflict-stage entry (stage 1-3).
    ///
    /// The caller removes the stage-0 entry first; recording a conflict at
    /// stage 0 is an invariant violation and is rejected.
    pub fn add_conflict(
        &mut self,
        path: impl Into<bstr::BString>,
        oid: ObjectId,
        mode: FileMode,
        stage: Stage,
        base_oid: Option<ObjectId>,
        our_oid: Option<ObjectId>,
        their_oid: Option<ObjectId>,
    ) -> Result<(), IndexError> {
        let path = path.into();
        if stage == Stage::Normal {
            return Err(IndexError::InvalidConflictStage {
                path: path.to_string(),
                stage: 0,
            });
        }

        self.add_entry(IndexEntry {
            path,
            oid,
            mode,
            stage,
            size: 0,
            mtime: 0,
            base_oid,
            our_oid,
            their_oid,
        });
        Ok(())
    }

    /// Paths of all stage-0 entries.
    pub fn staged_files(&self) -> Vec<&BStr> {
        self.entries
            .iter()
            .filter(|e| e.stage == Stage::Normal)
            .map(|e| e.path.as_ref())
            .collect()
    }

    /// Whether any entry carries a conflict stage.
    pub fn has_conflicts(&self) -> bool {
        self.entries.iter().any(|e| e.stage != Stage::Normal)
    }

    /// Distinct paths with conflict stages, in order.
    pub fn conflict_paths(&self) -> Vec<&BStr> {
        let mut paths: Vec<&BStr> = self
            .entries
            .iter()
            .filter(|e| e.stage != Stage::Normal)
            .map(|e| e.path.as_ref())
            .collect();
        paths.dedup();
        paths
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Create the tree hierarchy for the current stage-0 entries.
    ///
    /// Every referenced blob must already be in the object store; sub-trees
    /// are written bottom-up and the root tree OID is returned.
    pub fn write_tree(&self, odb: &ObjectDatabase) -> Result<ObjectId, IndexError> {
        write::write_tree_from_index(self, odb)
    }

    /// Whether the index plus working tree differ from the given HEAD tree.
    pub fn has_uncommitted_changes(
        &self,
        odb: &ObjectDatabase,
        head_tree: Option<&ObjectId>,
        work_tree: &Path,
    ) -> Result<bool, IndexError> {
        status::has_uncommitted_changes(self, odb, head_tree, work_tree)
    }

    fn insert_sorted(&mut self, entry: IndexEntry) {
        let pos = self
            .entries
            .binary_search_by(|e| {
                e.path
                    .cmp(&entry.path)
                    .then(e.stage.as_u32().cmp(&entry.stage.as_u32()))
            })
            .unwrap_or_else(|pos| pos);
        self.entries.insert(pos, entry);
    }
}

/// Stat a working file for the (size, mtime) pair cached in the index.
fn stat_working_file(work_tree: &Path, path: &BStr) -> Result<(i64, i64), IndexError> {
    use bstr::ByteSlice;
    let fs_path = work_tree.join(path.to_str_lossy().as_ref());
    match std::fs::metadata(&fs_path) {
        Ok(meta) => {
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            Ok((meta.len() as i64, mtime))
        }
        // Staging an object with no working file (e.g. from a tree) is
        // allowed; freshness data is simply absent.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((0, 0)),
        Err(e) => Err(IndexError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;

    fn oid(n: u8) -> ObjectId {
        ObjectId([n; 32])
    }

    fn tmp_tree() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn add_creates_stage0() {
        let wt = tmp_tree();
        std::fs::write(wt.path().join("a.txt"), "hello").unwrap();

        let mut index = Index::new();
        index
            .add("a.txt", oid(1), FileMode::Regular, wt.path())
            .unwrap();

        let entry = index.get(BStr::new("a.txt"), Stage::Normal).unwrap();
        assert_eq!(entry.oid, oid(1));
        assert_eq!(entry.size, 5);
        assert!(entry.mtime > 0);
    }

    #[test]
    fn add_replaces_existing() {
        let wt = tmp_tree();
        let mut index = Index::new();
        index
            .add("a.txt", oid(1), FileMode::Regular, wt.path())
            .unwrap();
        index
            .add("a.txt", oid(2), FileMode::Regular, wt.path())
            .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(
            index.get(BStr::new("a.txt"), Stage::Normal).unwrap().oid,
            oid(2)
        );
    }

    #[test]
    fn add_clears_conflict_stages() {
        let wt = tmp_tree();
        let mut index = Index::new();
        index
            .add_conflict("a.txt", oid(1), FileMode::Regular, Stage::Base, None, None, None)
            .unwrap();
        index
            .add_conflict("a.txt", oid(2), FileMode::Regular, Stage::Ours, None, None, None)
            .unwrap();
        assert!(index.has_conflicts());

        index
            .add("a.txt", oid(9), FileMode::Regular, wt.path())
            .unwrap();
        assert!(!index.has_conflicts());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let wt = tmp_tree();
        let mut index = Index::new();
        index
            .add("a.txt", oid(1), FileMode::Regular, wt.path())
            .unwrap();

        index.remove(BStr::new("a.txt"));
        index.remove(BStr::new("a.txt"));
        assert!(index.is_empty());
    }

    #[test]
    fn conflict_at_stage0_rejected() {
        let mut index = Index::new();
        let err = index
            .add_conflict("a.txt", oid(1), FileMode::Regular, Stage::Normal, None, None, None)
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidConflictStage { .. }));
    }

    #[test]
    fn entries_sorted_by_path_then_stage() {
        let mut index = Index::new();
        index
            .add_conflict("b.txt", oid(3), FileMode::Regular, Stage::Theirs, None, None, None)
            .unwrap();
        index
            .add_conflict("b.txt", oid(2), FileMode::Regular, Stage::Ours, None, None, None)
            .unwrap();
        index
            .add_conflict("a.txt", oid(1), FileMode::Regular, Stage::Base, None, None, None)
            .unwrap();

        let order: Vec<_> = index
            .entries()
            .iter()
            .map(|e| (e.path.to_string(), e.stage.as_u32()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a.txt".to_string(), 1),
                ("b.txt".to_string(), 2),
                ("b.txt".to_string(), 3)
            ]
        );
    }

    #[test]
    fn conflict_paths_dedup() {
        let mut index = Index::new();
        index
            .add_conflict("a.txt", oid(1), FileMode::Regular, Stage::Ours, None, None, None)
            .unwrap();
        index
            .add_conflict("a.txt", oid(2), FileMode::Regular, Stage::Theirs, None, None, None)
            .unwrap();

        assert_eq!(index.conflict_paths(), vec![BStr::new("a.txt")]);
    }

    #[test]
    fn staged_files_excludes_conflicts() {
        let wt = tmp_tree();
        let mut index = Index::new();
        index
            .add("clean.txt", oid(1), FileMode::Regular, wt.path())
            .unwrap();
        index
            .add_conflict("bad.txt", oid(2), FileMode::Regular, Stage::Ours, None, None, None)
            .unwrap();

        assert_eq!(index.staged_files(), vec![BStr::new("clean.txt")]);
    }
}
