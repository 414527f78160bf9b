//! Merge engine: merge-base driven three-way merges with conflict handling.
//!
//! The driver in [`driver`] implements the merge state machine
//! (fast-forward, already-up-to-date, three-way); [`tree`] reconciles the
//! three flattened trees path by path; [`content`] performs the line-level
//! three-way merge with conflict markers; [`conflict`] records unresolved
//! paths as index stages 1-3 and working-tree marker files.

pub mod conflict;
pub mod content;
pub mod driver;
pub mod tree;

use bstr::BString;
use vec_hash::ObjectId;
use vec_object::FileMode;

pub use content::{ConflictStyle, ContentMergeResult, MergeLabels};
pub use driver::merge_branch;

/// Which merge strategy to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Full three-way merge with content merging (the default).
    #[default]
    Recursive,
    /// Resolve every divergence by taking our side.
    Ours,
    /// Resolve every divergence by taking their side.
    Theirs,
}

impl Strategy {
    /// Parse a strategy name as given on a command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "recursive" => Some(Self::Recursive),
            "ours" => Some(Self::Ours),
            "theirs" => Some(Self::Theirs),
            _ => None,
        }
    }

    /// The canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Recursive => "recursive",
            Self::Ours => "ours",
            Self::Theirs => "theirs",
        }
    }
}

/// Options for a merge operation.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub strategy: Strategy,
    pub conflict_style: ConflictStyle,
}

/// How a merge concluded. Conflicts are an outcome, not an error.
#[derive(Debug)]
pub enum MergeOutcome {
    /// HEAD was an ancestor of the source; the branch advanced to it.
    FastForward { new_head: ObjectId },
    /// The source is already contained in HEAD; nothing changed.
    AlreadyUpToDate,
    /// A merge commit was created.
    Merged { commit: ObjectId },
    /// Conflicts were recorded in the index and working tree; no commit
    /// was created.
    Conflicted { conflicts: Vec<ConflictEntry> },
}

/// A file-level conflict.
#[derive(Debug, Clone)]
pub struct ConflictEntry {
    /// Path of the conflicted file.
    pub path: BString,
    /// What kind of divergence produced it.
    pub kind: ConflictKind,
    /// Common ancestor side, when the path existed in the base.
    pub base: Option<ConflictSide>,
    /// Our side, when present.
    pub ours: Option<ConflictSide>,
    /// Their side, when present.
    pub theirs: Option<ConflictSide>,
}

/// Kinds of merge conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Both sides changed the same region of a text file.
    Content,
    /// One side modified, the other deleted.
    ModifyDelete,
    /// Both sides added the path with different content.
    AddAdd,
    /// Both sides changed a binary file.
    Binary,
}

/// One side of a conflict.
#[derive(Debug, Clone, Copy)]
pub struct ConflictSide {
    pub oid: ObjectId,
    pub mode: FileMode,
}

/// Errors from merge operations (preconditions and plumbing; conflicted
/// merges are a [`MergeOutcome`], never an error).
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("cannot merge a branch into itself: {0}")]
    SameBranch(String),

    #[error("working tree has uncommitted changes")]
    DirtyWorkingTree,

    #[error("branch '{0}' has no commits")]
    UnbornBranch(String),

    #[error(transparent)]
    Walk(#[from] vec_revwalk::WalkError),

    #[error(transparent)]
    Ref(#[from] vec_ref::RefError),

    #[error(transparent)]
    Odb(#[from] vec_odb::OdbError),

    #[error(transparent)]
    Index(#[from] vec_index::IndexError),

    #[error(transparent)]
    Repo(#[from] vec_repository::RepoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_roundtrip() {
        for strategy in [Strategy::Recursive, Strategy::Ours, Strategy::Theirs] {
            assert_eq!(Strategy::from_name(strategy.name()), Some(strategy));
        }
        assert_eq!(Strategy::from_name("octopus"), None);
    }

    #[test]
    fn default_options() {
        let opts = MergeOptions::default();
        assert_eq!(opts.strategy, Strategy::Recursive);
        assert_eq!(opts.conflict_style, ConflictStyle::Merge);
    }
}
