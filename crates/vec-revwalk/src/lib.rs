//! Commit graph walks: merge-base discovery and ancestry checks.

mod merge_base;

pub use merge_base::{is_ancestor, merge_base, MergeBaseCache};

use vec_hash::ObjectId;

/// Errors from commit graph walks.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("no common ancestor between {a} and {b}")]
    NoCommonAncestor { a: ObjectId, b: ObjectId },

    #[error(transparent)]
    Odb(#[from] vec_odb::OdbError),
}
