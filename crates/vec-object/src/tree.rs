use bstr::{BStr, BString, ByteSlice};
use vec_hash::ObjectId;

use crate::{ObjectError, ObjectKind};

/// File mode for tree entries.
///
/// Raw values are decimal numerals that read like the POSIX octal
/// spellings: `100644`, `100755`, `40000`. The serialized form is the raw
/// value zero-padded to six decimal digits (`"100644"`, `"040000"`), and
/// this encoding is part of hash identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Regular file (100644)
    Regular,
    /// Executable file (100755)
    Executable,
    /// Subdirectory (040000)
    Dir,
    /// Unrecognized mode (preserved for round-trip)
    Unknown(u32),
}

/// The directory sentinel mode.
pub const MODE_DIR: u32 = 40_000;

impl FileMode {
    /// Parse from six-digit decimal ASCII (e.g., `b"100644"`, `b"040000"`).
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        let raw = parse_decimal(s)
            .ok_or_else(|| ObjectError::InvalidFileMode(String::from_utf8_lossy(s).into()))?;
        Ok(Self::from_raw(raw))
    }

    /// Create from the raw numeric value.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            100_644 => Self::Regular,
            100_755 => Self::Executable,
            MODE_DIR => Self::Dir,
            other => Self::Unknown(other),
        }
    }

    /// Serialize as six-digit zero-padded decimal.
    pub fn as_bytes(&self) -> Vec<u8> {
        format!("{:06}", self.raw()).into_bytes()
    }

    /// The raw numeric value.
    pub fn raw(&self) -> u32 {
        match self {
            Self::Regular => 100_644,
            Self::Executable => 100_755,
            Self::Dir => MODE_DIR,
            Self::Unknown(v) => *v,
        }
    }

    /// Is this a directory entry?
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir)
    }

    /// Is this a file (blob) entry?
    pub fn is_file(&self) -> bool {
        matches!(self, Self::Regular | Self::Executable)
    }
}

fn parse_decimal(s: &[u8]) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut val: u32 = 0;
    for &b in s {
        if !b.is_ascii_digit() {
            return None;
        }
        val = val.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
    }
    Some(val)
}

/// A single entry in a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub name: BString,
    pub oid: ObjectId,
}

impl TreeEntry {
    /// The kind of object this entry references, derived from its mode.
    pub fn kind(&self) -> ObjectKind {
        if self.mode.is_dir() {
            ObjectKind::Tree
        } else {
            ObjectKind::Blob
        }
    }
}

/// A tree object — an ordered directory listing.
///
/// Names within a tree are unique and entries serialize in strictly
/// ascending name order; both properties are enforced on parse.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Parse tree content from the binary format.
    ///
    /// Each entry is `"<mode6> <name>\0"` followed by 32 raw OID bytes.
    /// Entries must be in strictly ascending name order.
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let mut entries: Vec<TreeEntry> = Vec::new();
        let mut pos = 0;

        while pos < content.len() {
            let space_pos = content[pos..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "missing space after mode".into(),
                })?
                + pos;

            let mode = FileMode::from_bytes(&content[pos..space_pos]).map_err(|_| {
                ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "invalid mode".into(),
                }
            })?;

            let name_start = space_pos + 1;
            let null_pos = content[name_start..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| ObjectError::InvalidTreeEntry {
                    offset: name_start,
                    reason: "missing null after name".into(),
                })?
                + name_start;

            let name = BString::from(&content[name_start..null_pos]);
            if name.is_empty() {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: name_start,
                    reason: "empty name".into(),
                });
            }

            let oid_start = null_pos + 1;
            let oid_end = oid_start + 32;
            if oid_end > content.len() {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: oid_start,
                    reason: "truncated OID".into(),
                });
            }
            let oid = ObjectId::from_bytes(&content[oid_start..oid_end])?;

            if let Some(prev) = entries.last() {
                if prev.name >= name {
                    return Err(ObjectError::TreeOrder {
                        prev: prev.name.clone(),
                        next: name,
                    });
                }
            }

            entries.push(TreeEntry { mode, name, oid });
            pos = oid_end;
        }

        Ok(Self { entries })
    }

    /// Serialize tree content to the binary format.
    ///
    /// Entries are emitted in ascending name order regardless of the
    /// in-memory order.
    pub fn serialize_content(&self) -> Vec<u8> {
        let mut sorted: Vec<&TreeEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = Vec::new();
        for entry in sorted {
            out.extend_from_slice(&entry.mode.as_bytes());
            out.push(b' ');
            out.extend_from_slice(&entry.name);
            out.push(0);
            out.extend_from_slice(entry.oid.as_bytes());
        }
        out
    }

    /// Sort entries into canonical (ascending name) order.
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Lookup an entry by name.
    pub fn find(&self, name: &BStr) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name.as_bstr() == name)
    }

    /// Iterate entries.
    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId([n; 32])
    }

    #[test]
    fn file_mode_from_bytes() {
        assert_eq!(FileMode::from_bytes(b"100644").unwrap(), FileMode::Regular);
        assert_eq!(
            FileMode::from_bytes(b"100755").unwrap(),
            FileMode::Executable
        );
        assert_eq!(FileMode::from_bytes(b"040000").unwrap(), FileMode::Dir);
        assert!(FileMode::from_bytes(b"10x644").is_err());
        assert!(FileMode::from_bytes(b"").is_err());
    }

    #[test]
    fn file_mode_serializes_six_digits() {
        assert_eq!(FileMode::Regular.as_bytes(), b"100644");
        assert_eq!(FileMode::Dir.as_bytes(), b"040000");
    }

    #[test]
    fn file_mode_roundtrip() {
        for mode in [FileMode::Regular, FileMode::Executable, FileMode::Dir] {
            let bytes = mode.as_bytes();
            assert_eq!(FileMode::from_bytes(&bytes).unwrap(), mode);
        }
    }

    #[test]
    fn file_mode_predicates() {
        assert!(FileMode::Dir.is_dir());
        assert!(!FileMode::Regular.is_dir());
        assert!(FileMode::Regular.is_file());
        assert!(FileMode::Executable.is_file());
        assert!(!FileMode::Dir.is_file());
    }

    #[test]
    fn entry_kind_from_mode() {
        let dir = TreeEntry {
            mode: FileMode::Dir,
            name: BString::from("src"),
            oid: oid(1),
        };
        let file = TreeEntry {
            mode: FileMode::Regular,
            name: BString::from("a.txt"),
            oid: oid(2),
        };
        assert_eq!(dir.kind(), ObjectKind::Tree);
        assert_eq!(file.kind(), ObjectKind::Blob);
    }

    #[test]
    fn parse_empty_tree() {
        assert!(Tree::parse(b"").unwrap().is_empty());
    }

    #[test]
    fn parse_single_entry() {
        let mut data = Vec::new();
        data.extend_from_slice(b"100644 hello.txt\0");
        data.extend_from_slice(oid(7).as_bytes());

        let tree = Tree::parse(&data).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.entries[0].mode, FileMode::Regular);
        assert_eq!(tree.entries[0].name, "hello.txt");
        assert_eq!(tree.entries[0].oid, oid(7));
    }

    #[test]
    fn serialize_sorts_by_name() {
        let tree = Tree {
            entries: vec![
                TreeEntry {
                    mode: FileMode::Regular,
                    name: BString::from("b.txt"),
                    oid: oid(1),
                },
                TreeEntry {
                    mode: FileMode::Dir,
                    name: BString::from("a-dir"),
                    oid: oid(2),
                },
            ],
        };

        let serialized = tree.serialize_content();
        let parsed = Tree::parse(&serialized).unwrap();
        assert_eq!(parsed.entries[0].name, "a-dir");
        assert_eq!(parsed.entries[1].name, "b.txt");
    }

    #[test]
    fn serialize_parse_roundtrip() {
        let mut tree = Tree {
            entries: vec![
                TreeEntry {
                    mode: FileMode::Dir,
                    name: BString::from("src"),
                    oid: oid(3),
                },
                TreeEntry {
                    mode: FileMode::Executable,
                    name: BString::from("run.sh"),
                    oid: oid(4),
                },
                TreeEntry {
                    mode: FileMode::Regular,
                    name: BString::from("README"),
                    oid: oid(5),
                },
            ],
        };
        tree.sort();
        let parsed = Tree::parse(&tree.serialize_content()).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn parse_rejects_out_of_order() {
        let mut data = Vec::new();
        data.extend_from_slice(b"100644 b.txt\0");
        data.extend_from_slice(oid(1).as_bytes());
        data.extend_from_slice(b"100644 a.txt\0");
        data.extend_from_slice(oid(2).as_bytes());

        assert!(matches!(
            Tree::parse(&data),
            Err(ObjectError::TreeOrder { .. })
        ));
    }

    #[test]
    fn parse_rejects_duplicate_names() {
        let mut data = Vec::new();
        data.extend_from_slice(b"100644 same.txt\0");
        data.extend_from_slice(oid(1).as_bytes());
        data.extend_from_slice(b"100644 same.txt\0");
        data.extend_from_slice(oid(2).as_bytes());

        assert!(matches!(
            Tree::parse(&data),
            Err(ObjectError::TreeOrder { .. })
        ));
    }

    #[test]
    fn parse_rejects_truncated_oid() {
        let mut data = Vec::new();
        data.extend_from_slice(b"100644 short.txt\0");
        data.extend_from_slice(&[0u8; 16]);
        assert!(matches!(
            Tree::parse(&data),
            Err(ObjectError::InvalidTreeEntry { .. })
        ));
    }

    #[test]
    fn find_entry() {
        let tree = Tree {
            entries: vec![
                TreeEntry {
                    mode: FileMode::Regular,
                    name: BString::from("README.md"),
                    oid: oid(0),
                },
                TreeEntry {
                    mode: FileMode::Dir,
                    name: BString::from("src"),
                    oid: oid(0),
                },
            ],
        };
        assert!(tree.find(BStr::new("README.md")).is_some());
        assert!(tree.find(BStr::new("nonexistent")).is_none());
    }
}
