//! Index file parsing.

use bstr::BString;
use vec_hash::ObjectId;
use vec_object::FileMode;

use crate::entry::IndexEntry;
use crate::{Index, IndexError, Stage};

/// Parse an index file (big-endian layout).
///
/// Layout: `u32` entry count, then per entry `u32` mode, `u32` path length,
/// path bytes, 32 raw OID bytes, `i64` size, `i64` mtime, `u32` stage, and
/// three length-prefixed optional hex OIDs (base, ours, theirs; zero length
/// means absent). Entries must arrive sorted by `(path, stage)` with no
/// duplicates.
pub fn parse_index(data: &[u8]) -> Result<Index, IndexError> {
    let mut cur = Cursor { data, pos: 0 };

    let count = cur.read_u32()? as usize;
    // Guard against a corrupt count before allocating.
    if count > data.len() {
        return Err(IndexError::InvalidEntry {
            offset: 0,
            reason: format!("{count} entries in a {}-byte index", data.len()),
        });
    }

    let mut index = Index::new();
    let mut prev: Option<(BString, u32)> = None;

    for _ in 0..count {
        let entry_offset = cur.pos;
        let entry = parse_entry(&mut cur, entry_offset)?;

        let key = (entry.path.clone(), entry.stage.as_u32());
        if let Some(ref p) = prev {
            if *p >= key {
                return Err(IndexError::OutOfOrder {
                    prev: p.0.to_string(),
                    next: key.0.to_string(),
                });
            }
        }
        prev = Some(key);

        index.add_entry(entry);
    }

    if cur.pos != data.len() {
        return Err(IndexError::InvalidEntry {
            offset: cur.pos,
            reason: format!("{} trailing bytes", data.len() - cur.pos),
        });
    }

    Ok(index)
}

fn parse_entry(cur: &mut Cursor<'_>, offset: usize) -> Result<IndexEntry, IndexError> {
    let mode_raw = cur.read_u32()?;
    let path_len = cur.read_u32()? as usize;
    let path = BString::from(cur.take(path_len)?);
    if path.is_empty() {
        return Err(IndexError::InvalidEntry {
            offset,
            reason: "empty path".into(),
        });
    }

    let oid = ObjectId::from_bytes(cur.take(32)?)?;
    let size = cur.read_i64()?;
    let mtime = cur.read_i64()?;

    let stage_raw = cur.read_u32()?;
    let stage = Stage::from_u32(stage_raw).ok_or_else(|| IndexError::InvalidEntry {
        offset,
        reason: format!("invalid stage {stage_raw}"),
    })?;

    let base_oid = parse_optional_oid(cur, offset)?;
    let our_oid = parse_optional_oid(cur, offset)?;
    let their_oid = parse_optional_oid(cur, offset)?;

    Ok(IndexEntry {
        path,
        oid,
        mode: FileMode::from_raw(mode_raw),
        stage,
        size,
        mtime,
        base_oid,
        our_oid,
        their_oid,
    })
}

fn parse_optional_oid(
    cur: &mut Cursor<'_>,
    offset: usize,
) -> Result<Option<ObjectId>, IndexError> {
    let len = cur.read_u32()? as usize;
    if len == 0 {
        return Ok(None);
    }
    let bytes = cur.take(len)?;
    let hex = std::str::from_utf8(bytes).map_err(|_| IndexError::InvalidEntry {
        offset,
        reason: "non-UTF-8 hash field".into(),
    })?;
    Ok(Some(ObjectId::from_hex(hex)?))
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], IndexError> {
        if self.pos + n > self.data.len() {
            return Err(IndexError::Truncated {
                offset: self.pos,
                needed: n,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, IndexError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i64(&mut self) -> Result<i64, IndexError> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_index_parses() {
        let index = parse_index(&0u32.to_be_bytes()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn truncated_count_rejected() {
        assert!(matches!(
            parse_index(&[0, 0]),
            Err(IndexError::Truncated { .. })
        ));
    }

    #[test]
    fn absurd_count_rejected() {
        let data = u32::MAX.to_be_bytes();
        assert!(matches!(
            parse_index(&data),
            Err(IndexError::InvalidEntry { .. })
        ));
    }
}
