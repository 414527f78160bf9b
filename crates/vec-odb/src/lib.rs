//! Unified object database.
//!
//! Provides a single interface to read and write objects across loose
//! storage and packfiles. All higher-level operations (staging, merging,
//! history walks) go through this crate to access objects. Writes always
//! land in the loose store; packfiles are produced by repacking and
//! consumed transparently on the read path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use bstr::BString;
use vec_hash::ObjectId;
use vec_loose::LooseObjectStore;
use vec_object::{Blob, Commit, FileMode, Object, ObjectCache, ObjectKind, Tree};
use vec_pack::pack::PackFile;

/// Errors from object database operations.
#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("expected {expected} object, got {actual} for {oid}")]
    KindMismatch {
        oid: ObjectId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error(transparent)]
    Loose(#[from] vec_loose::LooseError),

    #[error(transparent)]
    Pack(#[from] vec_pack::PackError),

    #[error(transparent)]
    Object(#[from] vec_object::ObjectError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Lightweight object info (kind + size, no content).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub kind: ObjectKind,
    pub size: usize,
}

/// One file in a flattened tree: its blob OID and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatEntry {
    pub oid: ObjectId,
    pub mode: FileMode,
}

/// Unified object database over loose storage and packfiles.
pub struct ObjectDatabase {
    loose: LooseObjectStore,
    /// Pack files (RwLock so `refresh_packs` can swap the set).
    packs: RwLock<Vec<PackFile>>,
    /// Decoded-object cache.
    cache: Mutex<ObjectCache>,
    objects_dir: PathBuf,
}

impl ObjectDatabase {
    /// Open the object database at the given objects directory.
    pub fn open(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let loose = LooseObjectStore::open(&objects_dir);
        let packs = discover_packs(&objects_dir)?;

        Ok(Self {
            loose,
            packs: RwLock::new(packs),
            cache: Mutex::new(ObjectCache::new(1024)),
            objects_dir,
        })
    }

    /// The objects directory.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// The loose store backing this database.
    pub fn loose(&self) -> &LooseObjectStore {
        &self.loose
    }

    /// Re-scan the pack directory (after a repack wrote new files).
    pub fn refresh_packs(&self) -> Result<(), OdbError> {
        let fresh = discover_packs(&self.objects_dir)?;
        if let Ok(mut packs) = self.packs.write() {
            *packs = fresh;
        }
        Ok(())
    }

    /// Read an object by OID (loose first, then packs).
    pub fn read(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        if let Some(obj) = self.loose.read(oid)? {
            return Ok(Some(obj));
        }

        if let Ok(packs) = self.packs.read() {
            for pack in packs.iter() {
                if let Some(packed) = pack.read_object(oid)? {
                    return Ok(Some(Object::parse_content(packed.kind, &packed.data)?));
                }
            }
        }
        Ok(None)
    }

    /// Read an object through the decoded-object cache.
    pub fn read_cached(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(obj) = cache.get(oid) {
                return Ok(Some(obj.clone()));
            }
        }

        let obj = self.read(oid)?;
        if let (Some(obj), Ok(mut cache)) = (&obj, self.cache.lock()) {
            cache.insert(*oid, obj.clone());
        }
        Ok(obj)
    }

    /// Read just kind and size, without materializing packed content when
    /// the pack index already knows both.
    pub fn read_header(&self, oid: &ObjectId) -> Result<Option<ObjectInfo>, OdbError> {
        if let Some((kind, size)) = self.loose.read_header(oid)? {
            return Ok(Some(ObjectInfo { kind, size }));
        }

        if let Ok(packs) = self.packs.read() {
            for pack in packs.iter() {
                if let Some((kind, size)) = pack.read_info(oid) {
                    return Ok(Some(ObjectInfo {
                        kind,
                        size: size as usize,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Check if an object exists anywhere in the database.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        if self.loose.contains(oid) {
            return true;
        }
        match self.packs.read() {
            Ok(packs) => packs.iter().any(|p| p.contains(oid)),
            Err(_) => false,
        }
    }

    /// Write an object to the loose store. Idempotent.
    pub fn write(&self, obj: &Object) -> Result<ObjectId, OdbError> {
        Ok(self.loose.write(obj)?)
    }

    /// Write raw content with a known kind to the loose store. Idempotent.
    pub fn write_raw(&self, kind: ObjectKind, content: &[u8]) -> Result<ObjectId, OdbError> {
        Ok(self.loose.write_raw(kind, content)?)
    }

    /// Read an object that must exist and be a commit.
    pub fn read_commit(&self, oid: &ObjectId) -> Result<Commit, OdbError> {
        match self.read_cached(oid)? {
            Some(Object::Commit(c)) => Ok(c),
            Some(other) => Err(OdbError::KindMismatch {
                oid: *oid,
                expected: "commit",
                actual: other.kind().as_str(),
            }),
            None => Err(OdbError::NotFound(*oid)),
        }
    }

    /// Read an object that must exist and be a tree.
    pub fn read_tree(&self, oid: &ObjectId) -> Result<Tree, OdbError> {
        match self.read_cached(oid)? {
            Some(Object::Tree(t)) => Ok(t),
            Some(other) => Err(OdbError::KindMismatch {
                oid: *oid,
                expected: "tree",
                actual: other.kind().as_str(),
            }),
            None => Err(OdbError::NotFound(*oid)),
        }
    }

    /// Read an object that must exist and be a blob.
    pub fn read_blob(&self, oid: &ObjectId) -> Result<Blob, OdbError> {
        match self.read_cached(oid)? {
            Some(Object::Blob(b)) => Ok(b),
            Some(other) => Err(OdbError::KindMismatch {
                oid: *oid,
                expected: "blob",
                actual: other.kind().as_str(),
            }),
            None => Err(OdbError::NotFound(*oid)),
        }
    }

    /// Pack every loose object into a new packfile under `objects/pack/`.
    ///
    /// Writes `<name>.pack` and its index, then refreshes the pack set so
    /// reads immediately resolve through it. Loose copies are left in
    /// place (garbage collection is a separate concern). Returns `None`
    /// when there was nothing to pack.
    pub fn pack_loose_objects(&self, name: &str) -> Result<Option<PathBuf>, OdbError> {
        let oids: Vec<ObjectId> = self.loose.iter()?.collect::<Result<_, _>>()?;
        if oids.is_empty() {
            return Ok(None);
        }

        let pack_dir = self.objects_dir.join("pack");
        std::fs::create_dir_all(&pack_dir)?;

        let mut writer =
            vec_pack::write::PackWriter::new(pack_dir.join(format!("{name}.pack")))?;
        for oid in oids {
            if let Some((kind, body)) = self.loose.read_raw(&oid)? {
                writer.add(kind, &body)?;
            }
        }

        let mut finished = writer.finish()?;
        finished.write_index()?;
        self.refresh_packs()?;
        Ok(Some(finished.path))
    }

    /// Flatten a tree into `path -> (oid, mode)` over all nested files.
    ///
    /// Paths are forward-slash joined from the tree entry names. Directory
    /// entries are descended into, not reported.
    pub fn flatten_tree(&self, tree: &ObjectId) -> Result<BTreeMap<BString, FlatEntry>, OdbError> {
        let mut out = BTreeMap::new();
        self.flatten_into(tree, b"", &mut out)?;
        Ok(out)
    }

    fn flatten_into(
        &self,
        tree: &ObjectId,
        prefix: &[u8],
        out: &mut BTreeMap<BString, FlatEntry>,
    ) -> Result<(), OdbError> {
        let tree = self.read_tree(tree)?;
        for entry in tree.iter() {
            let mut path = BString::from(prefix);
            if !path.is_empty() {
                path.push(b'/');
            }
            path.extend_from_slice(&entry.name);

            if entry.mode.is_dir() {
                self.flatten_into(&entry.oid, &path, out)?;
            } else {
                out.insert(
                    path,
                    FlatEntry {
                        oid: entry.oid,
                        mode: entry.mode,
                    },
                );
            }
        }
        Ok(())
    }
}

/// Scan `objects/pack/` for `.pack` files with readable indexes.
fn discover_packs(objects_dir: &Path) -> Result<Vec<PackFile>, OdbError> {
    let pack_dir = objects_dir.join("pack");
    let mut packs = Vec::new();

    if pack_dir.is_dir() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&pack_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "pack"))
            .collect();
        paths.sort();

        for path in paths {
            // A pack without a readable index is skipped, not fatal: the
            // repack that produces packs writes the index last.
            if let Ok(pack) = PackFile::open(&path) {
                packs.push(pack);
            }
        }
    }

    Ok(packs)
}
