use std::fs;

use vec_hash::{Hasher, ObjectId};
use vec_object::{header, Object, ObjectKind};

use crate::{LooseError, LooseObjectStore};

impl LooseObjectStore {
    /// Check if a loose object exists.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.object_path(oid).is_file()
    }

    /// Read a loose object by OID.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    /// Returns `Err` if the object exists but is corrupt.
    pub fn read(&self, oid: &ObjectId) -> Result<Option<Object>, LooseError> {
        match self.read_raw(oid)? {
            Some((kind, body)) => Ok(Some(Object::parse_content(kind, &body)?)),
            None => Ok(None),
        }
    }

    /// Read the raw body of a loose object along with its kind.
    ///
    /// Validates that the header's declared length matches the file.
    pub fn read_raw(&self, oid: &ObjectId) -> Result<Option<(ObjectKind, Vec<u8>)>, LooseError> {
        let path = self.object_path(oid);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let (kind, content_size, header_len) = header::parse_header(&data)?;
        let body = &data[header_len..];
        if body.len() != content_size {
            return Err(LooseError::Corrupt {
                oid: oid.to_hex(),
                reason: format!(
                    "header declares {content_size} bytes, file has {}",
                    body.len()
                ),
            });
        }

        Ok(Some((kind, body.to_vec())))
    }

    /// Read just the header (kind + size) without loading the body.
    pub fn read_header(&self, oid: &ObjectId) -> Result<Option<(ObjectKind, usize)>, LooseError> {
        use std::io::Read;

        let path = self.object_path(oid);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        // Headers are short; 64 bytes is plenty of room for kind + size.
        let mut buf = [0u8; 64];
        let mut filled = 0;
        let mut reader = std::io::BufReader::new(file);
        loop {
            if filled >= buf.len() {
                return Err(LooseError::Corrupt {
                    oid: oid.to_hex(),
                    reason: "header exceeds 64 bytes".into(),
                });
            }
            let n = reader.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(LooseError::Corrupt {
                    oid: oid.to_hex(),
                    reason: "unexpected EOF before header null terminator".into(),
                });
            }
            filled += n;
            if buf[..filled].contains(&0) {
                break;
            }
        }

        let (kind, content_size, _) = header::parse_header(&buf[..filled])?;
        Ok(Some((kind, content_size)))
    }

    /// Read a loose object and verify its hash matches the expected OID.
    pub fn read_verified(&self, oid: &ObjectId) -> Result<Option<Object>, LooseError> {
        let Some((kind, body)) = self.read_raw(oid)? else {
            return Ok(None);
        };

        let actual = Hasher::hash_object(kind.as_str(), &body);
        if actual != *oid {
            return Err(LooseError::HashMismatch {
                path: self.object_path(oid),
                expected: oid.to_hex(),
                actual: actual.to_hex(),
            });
        }

        Ok(Some(Object::parse_content(kind, &body)?))
    }
}
