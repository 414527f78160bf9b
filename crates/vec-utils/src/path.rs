use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice, ByteVec};

use crate::error::UtilError;
use crate::Result;

/// A repository-relative path (always forward slashes, never absolute).
///
/// The index and the object model store paths with forward slashes
/// regardless of platform. This type enforces that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoPath(BString);

#[inline]
fn is_dir_sep(c: u8) -> bool {
    c == b'/' || c == b'\\'
}

impl RepoPath {
    /// Create from a byte slice, normalizing separators to forward slashes
    /// and stripping leading `./` and trailing slashes.
    pub fn new(path: impl AsRef<[u8]>) -> Result<Self> {
        let raw = path.as_ref();
        let mut normalized = BString::new(Vec::with_capacity(raw.len()));

        for &b in raw {
            if is_dir_sep(b) {
                normalized.push_byte(b'/');
            } else {
                normalized.push_byte(b);
            }
        }

        while normalized.starts_with(b"./") {
            normalized.drain(..2);
        }
        while normalized.last() == Some(&b'/') {
            normalized.pop();
        }

        if normalized.is_empty() {
            return Err(UtilError::Path("empty path".into()));
        }
        if normalized.first() == Some(&b'/') {
            return Err(UtilError::Path(format!(
                "absolute path not allowed: {}",
                normalized
            )));
        }
        for component in normalized.split_str("/") {
            if component.is_empty() {
                return Err(UtilError::Path(format!("empty component in {normalized}")));
            }
            if component == b".." {
                return Err(UtilError::Path(format!(
                    "path escapes repository: {normalized}"
                )));
            }
        }

        Ok(RepoPath(normalized))
    }

    /// Create from an already-normalized byte string (no validation).
    pub fn from_normalized(path: BString) -> Self {
        RepoPath(path)
    }

    /// Raw bytes of this path.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// This path as a `BStr`.
    pub fn as_bstr(&self) -> &BStr {
        self.0.as_bstr()
    }

    /// Consume into the underlying `BString`.
    pub fn into_bstring(self) -> BString {
        self.0
    }

    /// The final path component.
    pub fn file_name(&self) -> &BStr {
        match self.0.rfind_byte(b'/') {
            Some(pos) => self.0[pos + 1..].as_bstr(),
            None => self.0.as_bstr(),
        }
    }

    /// The parent directory, or `None` for a top-level path.
    pub fn parent(&self) -> Option<&BStr> {
        self.0
            .rfind_byte(b'/')
            .map(|pos| self.0[..pos].as_bstr())
    }

    /// Resolve this path under a working-tree root.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for component in self.0.split_str("/") {
            out.push(component.to_str_lossy().as_ref());
        }
        out
    }
}

impl std::fmt::Display for RepoPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_backslashes() {
        let p = RepoPath::new(r"src\main.rs").unwrap();
        assert_eq!(p.as_bytes(), b"src/main.rs");
    }

    #[test]
    fn strips_dot_prefix_and_trailing_slash() {
        let p = RepoPath::new("./docs/guide/").unwrap();
        assert_eq!(p.as_bytes(), b"docs/guide");
    }

    #[test]
    fn rejects_empty() {
        assert!(RepoPath::new("").is_err());
        assert!(RepoPath::new("./").is_err());
    }

    #[test]
    fn rejects_absolute() {
        assert!(RepoPath::new("/etc/passwd").is_err());
    }

    #[test]
    fn rejects_parent_escape() {
        assert!(RepoPath::new("../outside").is_err());
        assert!(RepoPath::new("a/../../b").is_err());
    }

    #[test]
    fn file_name_and_parent() {
        let p = RepoPath::new("a/b/c.txt").unwrap();
        assert_eq!(p.file_name(), "c.txt");
        assert_eq!(p.parent().unwrap(), "a/b");

        let top = RepoPath::new("README.md").unwrap();
        assert_eq!(top.file_name(), "README.md");
        assert!(top.parent().is_none());
    }

    #[test]
    fn to_fs_path_joins_components() {
        let p = RepoPath::new("a/b/c.txt").unwrap();
        let fs = p.to_fs_path(Path::new("/repo"));
        assert_eq!(fs, PathBuf::from("/repo/a/b/c.txt"));
    }
}
