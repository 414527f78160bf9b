use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use vec_hash::ObjectId;
use vec_utils::LockFile;

use crate::name::validate_branch_name;
use crate::reflog::{self, ReflogEntry};
use crate::RefError;

const SYMREF_PREFIX: &str = "ref: ";
const HEADS_PREFIX: &str = "refs/heads/";

/// Where HEAD currently points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// HEAD names a branch. `target` is `None` for an unborn branch
    /// (the branch file does not exist yet).
    Branch {
        name: String,
        target: Option<ObjectId>,
    },
    /// HEAD holds a hash directly.
    Detached(ObjectId),
}

/// File-based reference store rooted at the repository metadata directory.
pub struct RefStore {
    vec_dir: PathBuf,
}

impl RefStore {
    /// Open the store for the given `.vec` directory.
    pub fn new(vec_dir: impl AsRef<Path>) -> Self {
        Self {
            vec_dir: vec_dir.as_ref().to_path_buf(),
        }
    }

    fn head_path(&self) -> PathBuf {
        self.vec_dir.join("HEAD")
    }

    fn branch_path(&self, name: &str) -> PathBuf {
        self.vec_dir.join(HEADS_PREFIX).join(name)
    }

    /// Resolve HEAD: follow the symbolic pointer one level, or read the
    /// detached hash. No recursive symrefs.
    pub fn resolve_head(&self) -> Result<Head, RefError> {
        let raw = fs::read_to_string(self.head_path())
            .map_err(|e| RefError::MalformedHead(format!("unreadable: {e}")))?;
        let line = raw.trim();

        if let Some(rest) = line.strip_prefix(SYMREF_PREFIX) {
            let full = rest.trim();
            let name = full
                .strip_prefix(HEADS_PREFIX)
                .ok_or_else(|| RefError::MalformedHead(format!("unexpected target '{full}'")))?
                .to_string();
            let target = self.read_branch_opt(&name)?;
            return Ok(Head::Branch { name, target });
        }

        let oid = ObjectId::from_hex(line)
            .map_err(|_| RefError::MalformedHead(format!("not a hash: '{line}'")))?;
        Ok(Head::Detached(oid))
    }

    /// The commit HEAD ultimately points at, if any.
    pub fn head_target(&self) -> Result<Option<ObjectId>, RefError> {
        match self.resolve_head()? {
            Head::Branch { target, .. } => Ok(target),
            Head::Detached(oid) => Ok(Some(oid)),
        }
    }

    /// The name of the current branch. Fails on detached or malformed HEAD.
    pub fn current_branch(&self) -> Result<String, RefError> {
        match self.resolve_head()? {
            Head::Branch { name, .. } => Ok(name),
            Head::Detached(_) => Err(RefError::DetachedHead),
        }
    }

    /// Read a branch's hash. Fails if the branch does not exist.
    pub fn read_branch(&self, name: &str) -> Result<ObjectId, RefError> {
        self.read_branch_opt(name)?
            .ok_or_else(|| RefError::BranchNotFound(name.to_string()))
    }

    /// Read a branch's hash, `None` if the branch file does not exist.
    pub fn read_branch_opt(&self, name: &str) -> Result<Option<ObjectId>, RefError> {
        validate_branch_name(name)?;
        let raw = match fs::read_to_string(self.branch_path(name)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RefError::Io(e)),
        };
        let line = raw.trim();
        let oid = ObjectId::from_hex(line).map_err(|_| RefError::MalformedRef {
            name: name.to_string(),
            reason: format!("not a hash: '{line}'"),
        })?;
        Ok(Some(oid))
    }

    /// Whether the branch exists.
    pub fn branch_exists(&self, name: &str) -> bool {
        validate_branch_name(name).is_ok() && self.branch_path(name).is_file()
    }

    /// All branch names, sorted.
    pub fn list_branches(&self) -> Result<Vec<String>, RefError> {
        let heads = self.vec_dir.join(HEADS_PREFIX);
        let mut names = Vec::new();
        collect_branches(&heads, "", &mut names)?;
        names.sort();
        Ok(names)
    }

    /// Advance a branch to a new commit, atomically, appending a reflog
    /// line. Also logs against HEAD when HEAD is attached to this branch.
    pub fn update_branch(
        &self,
        name: &str,
        new: &ObjectId,
        who: &str,
        message: &str,
    ) -> Result<(), RefError> {
        validate_branch_name(name)?;
        let old = self.read_branch_opt(name)?.unwrap_or(ObjectId::NULL);
        let path = self.branch_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut lock = LockFile::acquire(&path)
            .map_err(|_| RefError::LockFailed(path.display().to_string()))?;
        writeln!(lock, "{}", new.to_hex())?;
        lock.commit()
            .map_err(|_| RefError::LockFailed(path.display().to_string()))?;

        let entry = ReflogEntry::now(old, *new, who, message);
        reflog::append(
            &self.vec_dir.join("logs").join(HEADS_PREFIX).join(name),
            &entry,
        )?;
        if matches!(self.resolve_head()?, Head::Branch { name: ref n, .. } if n == name) {
            reflog::append(&self.vec_dir.join("logs").join("HEAD"), &entry)?;
        }

        Ok(())
    }

    /// Create a new branch at the given commit. Fails if it exists.
    pub fn create_branch(
        &self,
        name: &str,
        target: &ObjectId,
        who: &str,
    ) -> Result<(), RefError> {
        validate_branch_name(name)?;
        if self.branch_exists(name) {
            return Err(RefError::BranchExists(name.to_string()));
        }
        self.update_branch(name, target, who, &format!("branch: created from {target}"))
    }

    /// Point HEAD at a branch (attached state).
    pub fn set_head_to_branch(&self, name: &str) -> Result<(), RefError> {
        validate_branch_name(name)?;
        self.write_head(&format!("{SYMREF_PREFIX}{HEADS_PREFIX}{name}\n"))
    }

    /// Point HEAD directly at a commit (detached state).
    pub fn detach_head(&self, oid: &ObjectId) -> Result<(), RefError> {
        self.write_head(&format!("{}\n", oid.to_hex()))
    }

    /// Read the reflog for a branch, oldest first. Missing log = empty.
    pub fn read_reflog(&self, name: &str) -> Result<Vec<ReflogEntry>, RefError> {
        validate_branch_name(name)?;
        reflog::read(&self.vec_dir.join("logs").join(HEADS_PREFIX).join(name))
    }

    fn write_head(&self, content: &str) -> Result<(), RefError> {
        let path = self.head_path();
        let mut lock = LockFile::acquire(&path)
            .map_err(|_| RefError::LockFailed(path.display().to_string()))?;
        lock.write_all(content.as_bytes())?;
        lock.commit()
            .map_err(|_| RefError::LockFailed(path.display().to_string()))
    }
}

fn collect_branches(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<(), RefError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(RefError::Io(e)),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let qualified = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        if entry.file_type()?.is_dir() {
            collect_branches(&entry.path(), &qualified, out)?;
        } else if !name.ends_with(".lock") {
            out.push(qualified);
        }
    }
    Ok(())
}
