//! Packfile reading, writing, delta encoding, and index support.
//!
//! A packfile stores many objects in one file with zlib-compressed payloads
//! and optional delta compression between similar objects. The companion
//! `VIDX` index file gives random access by OID. Packfiles are immutable;
//! their indexes are regenerated alongside them.

pub mod delta;
pub mod entry;
pub mod index;
pub mod pack;
pub mod write;

use vec_hash::ObjectId;
use vec_object::ObjectKind;

/// Errors that can occur during pack operations.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid pack header: {0}")]
    InvalidHeader(String),

    #[error("invalid pack index: {0}")]
    InvalidIndex(String),

    #[error("invalid delta at offset {offset}: {reason}")]
    InvalidDelta { offset: u64, reason: String },

    #[error("delta base not found: {0}")]
    MissingBase(ObjectId),

    #[error("delta chain too deep (>{max_depth} levels) at offset {offset}")]
    DeltaChainTooDeep { offset: u64, max_depth: usize },

    #[error("pack checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("corrupt pack entry at offset {0}")]
    CorruptEntry(u64),

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Object(#[from] vec_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] vec_hash::HashError),
}

/// Kind of a packed record as stored in entry headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackEntryKind {
    Commit,
    Tree,
    Blob,
    /// Delta referencing its base object by OID.
    Delta { base_oid: ObjectId },
}

impl PackEntryKind {
    /// Convert a non-delta entry kind to an ObjectKind.
    pub fn to_object_kind(&self) -> Option<ObjectKind> {
        match self {
            Self::Commit => Some(ObjectKind::Commit),
            Self::Tree => Some(ObjectKind::Tree),
            Self::Blob => Some(ObjectKind::Blob),
            Self::Delta { .. } => None,
        }
    }

    /// Kind number as used in pack entry headers (bits 6..4 of the first byte).
    pub fn kind_number(&self) -> u8 {
        match self {
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Delta { .. } => 4,
        }
    }
}

/// Map an ObjectKind to its pack header kind number.
pub fn kind_number(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Commit => 1,
        ObjectKind::Tree => 2,
        ObjectKind::Blob => 3,
    }
}

/// Map a pack header kind number back to an ObjectKind (non-delta only).
pub fn kind_from_number(n: u8) -> Option<ObjectKind> {
    match n {
        1 => Some(ObjectKind::Commit),
        2 => Some(ObjectKind::Tree),
        3 => Some(ObjectKind::Blob),
        _ => None,
    }
}

/// A fully resolved object read from a packfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

/// Pack format constants.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_SIZE: usize = 12;

/// Pack index constants.
pub const VIDX_SIGNATURE: &[u8; 4] = b"VIDX";
pub const VIDX_VERSION: u32 = 1;
/// Fixed size of one index entry: 64 hex bytes + u64 offset + u8 kind + u64 size.
pub const VIDX_ENTRY_SIZE: usize = 64 + 8 + 1 + 8;

/// Maximum delta chain depth before we declare a cycle.
pub const MAX_DELTA_CHAIN_DEPTH: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_numbers_roundtrip() {
        for kind in [ObjectKind::Commit, ObjectKind::Tree, ObjectKind::Blob] {
            assert_eq!(kind_from_number(kind_number(kind)), Some(kind));
        }
        assert_eq!(kind_from_number(4), None);
        assert_eq!(kind_from_number(0), None);
    }

    #[test]
    fn delta_kind_has_no_object_kind() {
        let delta = PackEntryKind::Delta {
            base_oid: ObjectId::NULL,
        };
        assert_eq!(delta.to_object_kind(), None);
        assert_eq!(delta.kind_number(), 4);
    }
}
