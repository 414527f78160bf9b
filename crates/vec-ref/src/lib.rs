//! References: branch pointers, the symbolic HEAD, and the reflog.
//!
//! A branch is a single-line file under `refs/heads/` holding one hash.
//! `HEAD` either names a branch (`"ref: refs/heads/<name>"`) or holds a
//! hash directly (detached). All updates go through the lock-file protocol
//! so readers never observe a partially written hash.

pub mod name;
pub mod reflog;
mod store;

pub use reflog::ReflogEntry;
pub use store::{Head, RefStore};

/// Errors from reference operations.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    #[error("invalid reference name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("malformed HEAD: {0}")]
    MalformedHead(String),

    #[error("HEAD is detached")]
    DetachedHead,

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("malformed reference '{name}': {reason}")]
    MalformedRef { name: String, reason: String },

    #[error("lock failed for {0}")]
    LockFailed(String),

    #[error(transparent)]
    Hash(#[from] vec_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
