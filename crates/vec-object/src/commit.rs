use vec_hash::ObjectId;

use crate::ObjectError;

/// A commit object — a snapshot plus its ancestry and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// OID of the root tree.
    pub tree: ObjectId,
    /// Parent commit OIDs in order (empty for a root commit, two for a merge).
    pub parents: Vec<ObjectId>,
    /// Author identity, e.g. `"Jane Doe <jane@example.com>"`.
    pub author: String,
    /// Committer identity; conventionally falls back to the author.
    pub committer: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Commit message.
    pub message: String,
}

impl Commit {
    /// Parse commit content from the binary format (no object header).
    ///
    /// Layout, with `u32` length prefixes in little-endian:
    /// tree hex, parent count (`u32`), each parent hex, author, committer,
    /// raw `i64` timestamp, message.
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let mut cur = Cursor::new(content);

        let tree_hex = cur.read_string("tree")?;
        let tree = ObjectId::from_hex(&tree_hex).map_err(|e| ObjectError::InvalidCommitField {
            field: "tree",
            reason: e.to_string(),
        })?;

        let parent_count = cur.read_u32("parent count")? as usize;
        // An absurd count means a corrupt buffer, not a real commit.
        if parent_count > content.len() {
            return Err(ObjectError::InvalidCommitField {
                field: "parent count",
                reason: format!("{parent_count} parents in a {}-byte commit", content.len()),
            });
        }
        let mut parents = Vec::with_capacity(parent_count);
        for _ in 0..parent_count {
            let hex = cur.read_string("parent")?;
            parents.push(ObjectId::from_hex(&hex).map_err(|e| {
                ObjectError::InvalidCommitField {
                    field: "parent",
                    reason: e.to_string(),
                }
            })?);
        }

        let author = cur.read_string("author")?;
        let committer = cur.read_string("committer")?;
        let timestamp = cur.read_i64("timestamp")?;
        let message = cur.read_string("message")?;

        if !cur.at_end() {
            return Err(ObjectError::InvalidCommitField {
                field: "message",
                reason: format!("{} trailing bytes", cur.remaining()),
            });
        }

        Ok(Self {
            tree,
            parents,
            author,
            committer,
            timestamp,
            message,
        })
    }

    /// Serialize commit content to the binary format.
    ///
    /// The byte layout is part of hash identity and must not change.
    pub fn serialize_content(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_string(&mut out, &self.tree.to_hex());
        out.extend_from_slice(&(self.parents.len() as u32).to_le_bytes());
        for parent in &self.parents {
            write_string(&mut out, &parent.to_hex());
        }
        write_string(&mut out, &self.author);
        write_string(&mut out, &self.committer);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        write_string(&mut out, &self.message);
        out
    }

    /// Whether this is a merge commit (two or more parents).
    pub fn is_merge(&self) -> bool {
        self.parents.len() >= 2
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Byte-cursor over commit content.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], ObjectError> {
        if self.pos + n > self.data.len() {
            return Err(ObjectError::InvalidCommitField {
                field,
                reason: format!(
                    "truncated: need {n} bytes, {} left",
                    self.data.len() - self.pos
                ),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self, field: &'static str) -> Result<u32, ObjectError> {
        let b = self.take(4, field)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i64(&mut self, field: &'static str) -> Result<i64, ObjectError> {
        let b = self.take(8, field)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_string(&mut self, field: &'static str) -> Result<String, ObjectError> {
        let len = self.read_u32(field)? as usize;
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ObjectError::InvalidCommitField {
            field,
            reason: "not valid UTF-8".into(),
        })
    }

    fn at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}
