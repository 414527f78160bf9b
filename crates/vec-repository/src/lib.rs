//! Repository discovery, initialization, and central access to the
//! subsystems: object database, index, references, and configuration.

mod discover;
mod error;
mod init;
mod worktree;

pub use error::RepoError;

use std::path::{Path, PathBuf};

use vec_config::Config;
use vec_hash::{Hasher, ObjectId};
use vec_index::Index;
use vec_object::{Commit, FileMode, Object};
use vec_odb::ObjectDatabase;
use vec_ref::{Head, RefStore};
use vec_utils::path::RepoPath;

/// Name of the repository metadata directory.
pub const VEC_DIR: &str = ".vec";

/// A repository: a working tree plus its `.vec` metadata directory.
pub struct Repository {
    vec_dir: PathBuf,
    work_tree: PathBuf,
    odb: ObjectDatabase,
    refs: RefStore,
    config: Config,
}

impl Repository {
    /// Open the repository whose working tree root is `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let work_tree = path.as_ref().to_path_buf();
        let vec_dir = work_tree.join(VEC_DIR);
        if !vec_dir.join("HEAD").is_file() {
            return Err(RepoError::NotARepository(work_tree));
        }
        Self::from_dirs(vec_dir, work_tree)
    }

    /// Discover a repository by walking up from `start`.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, RepoError> {
        let (vec_dir, work_tree) = discover::find_vec_dir(start.as_ref())?;
        Self::from_dirs(vec_dir, work_tree)
    }

    /// Initialize a new repository at `path` (idempotent re-init).
    pub fn init(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let work_tree = path.as_ref().to_path_buf();
        let vec_dir = init::init_repository(&work_tree)?;
        Self::from_dirs(vec_dir, work_tree)
    }

    fn from_dirs(vec_dir: PathBuf, work_tree: PathBuf) -> Result<Self, RepoError> {
        let odb = ObjectDatabase::open(vec_dir.join("objects"))?;
        let refs = RefStore::new(&vec_dir);
        let config = Config::load(vec_dir.join("config"))?;
        Ok(Self {
            vec_dir,
            work_tree,
            odb,
            refs,
            config,
        })
    }

    // --- Accessors ---

    /// The `.vec` metadata directory.
    pub fn vec_dir(&self) -> &Path {
        &self.vec_dir
    }

    /// The working tree root.
    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    /// The object database.
    pub fn odb(&self) -> &ObjectDatabase {
        &self.odb
    }

    /// The reference store.
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// The repository configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the index file.
    pub fn index_path(&self) -> PathBuf {
        self.vec_dir.join("index")
    }

    /// Directory of the merge-base result cache.
    pub fn merge_base_cache_dir(&self) -> PathBuf {
        self.vec_dir.join("cached_merge_base")
    }

    /// Load the index (empty when the file does not exist yet).
    pub fn load_index(&self) -> Result<Index, RepoError> {
        Ok(Index::load(self.index_path())?)
    }

    /// The commit identity from config, required for creating commits.
    pub fn identity(&self) -> Result<String, RepoError> {
        self.config.user_identity().ok_or(RepoError::MissingIdentity)
    }

    /// The tree of the commit HEAD points at, if HEAD has a target.
    pub fn head_tree(&self) -> Result<Option<ObjectId>, RepoError> {
        match self.refs.head_target()? {
            Some(tip) => Ok(Some(self.odb.read_commit(&tip)?.tree)),
            None => Ok(None),
        }
    }

    // --- Staging ---

    /// Hash a working file, store the blob, and stage it at stage 0.
    pub fn stage_file(&self, path: &str) -> Result<ObjectId, RepoError> {
        let repo_path = RepoPath::new(path)?;
        let fs_path = repo_path.to_fs_path(&self.work_tree);
        if !fs_path.is_file() {
            return Err(RepoError::NotAFile(fs_path));
        }

        let content = std::fs::read(&fs_path)?;
        let oid = self.odb.write_raw(vec_object::ObjectKind::Blob, &content)?;

        let mode = file_mode_of(&fs_path);
        let mut index = self.load_index()?;
        index.add(repo_path.into_bstring(), oid, mode, &self.work_tree)?;
        index.write_to(self.index_path())?;

        Ok(oid)
    }

    /// Remove a path from the index (stage 0). The working file stays.
    pub fn unstage(&self, path: &str) -> Result<(), RepoError> {
        let repo_path = RepoPath::new(path)?;
        let mut index = self.load_index()?;
        index.remove(repo_path.as_bstr());
        index.write_to(self.index_path())?;
        Ok(())
    }

    // --- Commits ---

    /// Create a commit from the current index on the current branch.
    ///
    /// The author comes from the repository config; the new commit's single
    /// parent is the current HEAD target (none for a root commit).
    pub fn commit(&self, message: &str) -> Result<ObjectId, RepoError> {
        let identity = self.identity()?;

        let index = self.load_index()?;
        let tree = index.write_tree(&self.odb)?;

        let parent = self.refs.head_target()?;
        if let Some(tip) = parent {
            if self.odb.read_commit(&tip)?.tree == tree {
                return Err(RepoError::NothingToCommit);
            }
        }

        let commit = Commit {
            tree,
            parents: parent.into_iter().collect(),
            author: identity.clone(),
            committer: identity.clone(),
            timestamp: vec_utils::date::Timestamp::now().seconds,
            message: message.to_string(),
        };
        let oid = self.odb.write(&Object::Commit(commit))?;

        self.advance_head(&oid, &identity, &format!("commit: {}", first_line(message)))?;
        Ok(oid)
    }

    /// Move HEAD (attached branch or detached) to a new commit.
    pub fn advance_head(
        &self,
        new: &ObjectId,
        who: &str,
        message: &str,
    ) -> Result<(), RepoError> {
        match self.refs.resolve_head()? {
            Head::Branch { name, .. } => {
                self.refs.update_branch(&name, new, who, message)?;
            }
            Head::Detached(_) => {
                self.refs.detach_head(new)?;
            }
        }
        Ok(())
    }

    // --- Branches and checkout ---

    /// Create a branch at the current HEAD target.
    pub fn create_branch(&self, name: &str) -> Result<(), RepoError> {
        let target = self
            .refs
            .head_target()?
            .ok_or_else(|| vec_ref::RefError::BranchNotFound("HEAD".into()))?;
        let who = self.identity().unwrap_or_else(|_| "vecr".into());
        self.refs.create_branch(name, &target, &who)?;
        Ok(())
    }

    /// Switch to a branch: requires a clean tree, materializes the branch
    /// tip's tree, and re-attaches HEAD.
    pub fn checkout_branch(&self, name: &str) -> Result<(), RepoError> {
        if !self.status_is_clean()? {
            return Err(RepoError::DirtyWorkingTree);
        }

        let tip = self.refs.read_branch(name)?;
        let tree = self.odb.read_commit(&tip)?.tree;
        self.checkout_tree(&tree)?;
        self.refs.set_head_to_branch(name)?;
        Ok(())
    }

    /// Materialize a tree into the working tree and reset the index to it.
    pub fn checkout_tree(&self, tree: &ObjectId) -> Result<(), RepoError> {
        worktree::checkout_tree(self, tree)
    }

    /// Whether the index and working tree match HEAD exactly.
    pub fn status_is_clean(&self) -> Result<bool, RepoError> {
        let index = self.load_index()?;
        let head_tree = self.head_tree()?;
        Ok(!index.has_uncommitted_changes(&self.odb, head_tree.as_ref(), &self.work_tree)?)
    }

    /// Hash a working file's current content as a blob (without storing).
    pub fn hash_working_file(&self, path: &str) -> Result<ObjectId, RepoError> {
        let repo_path = RepoPath::new(path)?;
        let content = std::fs::read(repo_path.to_fs_path(&self.work_tree))?;
        Ok(Hasher::hash_object("blob", &content))
    }
}

/// The index mode for a working file (executable bit on Unix).
fn file_mode_of(path: &Path) -> FileMode {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = std::fs::metadata(path) {
            if meta.permissions().mode() & 0o111 != 0 {
                return FileMode::Executable;
            }
        }
    }
    let _ = path;
    FileMode::Regular
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn init_with_identity(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(
            repo.vec_dir().join("config"),
            "[user]\n\tname = Test\n\temail = test@example.com\n",
        )
        .unwrap();
        Repository::open(dir).unwrap()
    }

    #[test]
    fn open_missing_repo_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Repository::open(dir.path()),
            Err(RepoError::NotARepository(_))
        ));
    }

    #[test]
    fn stage_and_commit_then_clean() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_identity(dir.path());

        std::fs::write(dir.path().join("file.txt"), "hello\n").unwrap();
        repo.stage_file("file.txt").unwrap();
        assert!(!repo.status_is_clean().unwrap());

        let commit_oid = repo.commit("initial").unwrap();
        assert!(repo.status_is_clean().unwrap());

        let commit = repo.odb().read_commit(&commit_oid).unwrap();
        assert!(commit.parents.is_empty());
        assert_eq!(commit.author, "Test <test@example.com>");
        assert_eq!(commit.message, "initial");

        assert_eq!(repo.refs().read_branch("main").unwrap(), commit_oid);
    }

    #[test]
    fn commit_without_identity_fails() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        std::fs::write(dir.path().join("file.txt"), "x").unwrap();
        repo.stage_file("file.txt").unwrap();
        assert!(matches!(repo.commit("nope"), Err(RepoError::MissingIdentity)));
    }

    #[test]
    fn second_commit_links_parent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_identity(dir.path());

        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        repo.stage_file("a.txt").unwrap();
        let first = repo.commit("first").unwrap();

        std::fs::write(dir.path().join("a.txt"), "two\n").unwrap();
        repo.stage_file("a.txt").unwrap();
        let second = repo.commit("second").unwrap();

        let commit = repo.odb().read_commit(&second).unwrap();
        assert_eq!(commit.parents, vec![first]);
    }

    #[test]
    fn empty_commit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_identity(dir.path());

        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        repo.stage_file("a.txt").unwrap();
        repo.commit("first").unwrap();

        assert!(matches!(
            repo.commit("again"),
            Err(RepoError::NothingToCommit)
        ));
    }

    #[test]
    fn stage_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_identity(dir.path());
        assert!(matches!(
            repo.stage_file("ghost.txt"),
            Err(RepoError::NotAFile(_))
        ));
    }
}
