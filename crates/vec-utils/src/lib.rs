//! Shared plumbing for the vecr version control system.
//!
//! This crate carries the pieces every other subsystem leans on: the RAII
//! lock file used for atomic reference and index updates, forward-slash
//! path normalization for working-tree paths, and wall-clock helpers for
//! commit timestamps and reflog lines.

pub mod date;
pub mod error;
pub mod lockfile;
pub mod path;

pub use error::{LockError, UtilError};
pub use lockfile::LockFile;
pub use path::RepoPath;

pub type Result<T> = std::result::Result<T, UtilError>;
