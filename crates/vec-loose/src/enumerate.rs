use std::fs;
use std::path::{Path, PathBuf};

use vec_hash::ObjectId;

use crate::LooseError;

/// Iterator over loose object OIDs.
///
/// Walks the fan-out directories (`00`–`ff`) under the objects directory and
/// yields each valid OID found. Files that do not form a valid hex name are
/// skipped (temp files, editor droppings).
pub struct LooseObjectIter {
    /// Sorted list of fan-out directory paths.
    dirs: Vec<PathBuf>,
    dir_index: usize,
    /// Sorted file names in the current fan-out directory.
    current_names: Vec<String>,
    name_index: usize,
    /// Two-char hex prefix of the current fan-out directory.
    current_prefix: String,
}

impl LooseObjectIter {
    pub(crate) fn new(objects_dir: &Path) -> Result<Self, LooseError> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        if objects_dir.is_dir() {
            for entry in fs::read_dir(objects_dir)? {
                let entry = entry?;
                let name = entry.file_name();
                let name_str = name.to_string_lossy();
                // Fan-out directories are exactly 2 hex chars.
                if name_str.len() == 2
                    && name_str.chars().all(|c| c.is_ascii_hexdigit())
                    && entry.file_type()?.is_dir()
                {
                    dirs.push(entry.path());
                }
            }
        }
        dirs.sort();

        Ok(Self {
            dirs,
            dir_index: 0,
            current_names: Vec::new(),
            name_index: 0,
            current_prefix: String::new(),
        })
    }

    /// Load names from the next non-empty fan-out directory.
    fn advance_dir(&mut self) -> Result<bool, LooseError> {
        while self.dir_index < self.dirs.len() {
            let dir_path = self.dirs[self.dir_index].clone();
            self.dir_index += 1;
            self.current_prefix = dir_path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            let mut names: Vec<String> = Vec::new();
            for entry in fs::read_dir(&dir_path)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            names.sort();

            if !names.is_empty() {
                self.current_names = names;
                self.name_index = 0;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Iterator for LooseObjectIter {
    type Item = Result<ObjectId, LooseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.name_index < self.current_names.len() {
                let name = &self.current_names[self.name_index];
                self.name_index += 1;

                let hex = format!("{}{}", self.current_prefix, name);
                match ObjectId::from_hex(&hex) {
                    Ok(oid) => return Some(Ok(oid)),
                    Err(_) => continue, // not an object file
                }
            }

            match self.advance_dir() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::LooseObjectStore;
    use vec_object::ObjectKind;

    #[test]
    fn empty_store_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::open(dir.path());
        assert_eq!(store.iter().unwrap().count(), 0);
    }

    #[test]
    fn enumerates_written_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::open(dir.path());

        let mut written = vec![
            store.write_raw(ObjectKind::Blob, b"one").unwrap(),
            store.write_raw(ObjectKind::Blob, b"two").unwrap(),
            store.write_raw(ObjectKind::Tree, b"").unwrap(),
        ];
        written.sort();

        let mut found: Vec<_> = store
            .iter()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        found.sort();

        assert_eq!(found, written);
    }

    #[test]
    fn skips_non_object_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::open(dir.path());
        let oid = store.write_raw(ObjectKind::Blob, b"real").unwrap();

        // Drop junk into a fan-out directory.
        let fanout = dir.path().join(&oid.to_hex()[..2]);
        std::fs::write(fanout.join("notahash"), b"junk").unwrap();

        let found: Vec<_> = store
            .iter()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(found, vec![oid]);
    }
}
