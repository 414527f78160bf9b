use std::path::PathBuf;

/// Errors from repository-level operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a repository (no .vec directory found): {0}")]
    NotARepository(PathBuf),

    #[error("user identity not configured; set user.name and user.email in .vec/config")]
    MissingIdentity,

    #[error("working tree has uncommitted changes")]
    DirtyWorkingTree,

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("path is not a file: {0}")]
    NotAFile(PathBuf),

    #[error(transparent)]
    Ref(#[from] vec_ref::RefError),

    #[error(transparent)]
    Odb(#[from] vec_odb::OdbError),

    #[error(transparent)]
    Index(#[from] vec_index::IndexError),

    #[error(transparent)]
    Config(#[from] vec_config::ConfigError),

    #[error(transparent)]
    Util(#[from] vec_utils::UtilError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
