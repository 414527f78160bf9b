//! Merge-base discovery.
//!
//! Two breadth-first walks: the first records a generation number (BFS
//! depth, first visit wins) for every commit reachable from `a`; the second
//! walks from `b` and treats every commit with a recorded generation as a
//! candidate, costed by that generation. The minimum-cost candidate is the
//! merge base; on ties the first candidate encountered wins, which is
//! deterministic because parents are queued in commit order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use vec_hash::ObjectId;
use vec_odb::ObjectDatabase;

use crate::WalkError;

/// Best-effort on-disk cache of merge-base results.
///
/// One file per query, named `<A>-<B>`, holding a single hex hash. Every
/// read failure of any kind falls through to recomputation and every write
/// failure is ignored; correctness never depends on the cache.
pub struct MergeBaseCache {
    dir: PathBuf,
}

impl MergeBaseCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn entry_path(&self, a: &ObjectId, b: &ObjectId) -> PathBuf {
        self.dir.join(format!("{}-{}", a.to_hex(), b.to_hex()))
    }

    fn lookup(&self, a: &ObjectId, b: &ObjectId) -> Option<ObjectId> {
        let content = std::fs::read_to_string(self.entry_path(a, b)).ok()?;
        ObjectId::from_hex(content.trim()).ok()
    }

    fn store(&self, a: &ObjectId, b: &ObjectId, base: &ObjectId) {
        if std::fs::create_dir_all(&self.dir).is_err() {
            return;
        }
        let _ = std::fs::write(self.entry_path(a, b), format!("{}\n", base.to_hex()));
    }
}

/// Find the most recent common ancestor of two commits.
///
/// `a == b` returns `a` immediately; if one side is an ancestor of the
/// other, that side is the base. Fails with
/// [`WalkError::NoCommonAncestor`] when the histories are unrelated.
pub fn merge_base(
    odb: &ObjectDatabase,
    a: &ObjectId,
    b: &ObjectId,
    cache: Option<&MergeBaseCache>,
) -> Result<ObjectId, WalkError> {
    if a == b {
        return Ok(*a);
    }

    if let Some(cache) = cache {
        if let Some(hit) = cache.lookup(a, b) {
            return Ok(hit);
        }
    }

    let generation = generations_from(odb, a)?;

    // Walk from b, collecting the cheapest commit also reachable from a.
    let mut best: Option<(usize, ObjectId)> = None;
    let mut visited: HashSet<ObjectId> = HashSet::new();
    let mut queue: VecDeque<ObjectId> = VecDeque::new();
    visited.insert(*b);
    queue.push_back(*b);

    while let Some(current) = queue.pop_front() {
        if let Some(&cost) = generation.get(&current) {
            let cheaper = match best {
                Some((best_cost, _)) => cost < best_cost,
                None => true,
            };
            if cheaper {
                best = Some((cost, current));
            }
        }

        let commit = odb.read_commit(&current)?;
        for parent in &commit.parents {
            if visited.insert(*parent) {
                queue.push_back(*parent);
            }
        }
    }

    match best {
        Some((_, base)) => {
            if let Some(cache) = cache {
                cache.store(a, b, &base);
            }
            Ok(base)
        }
        None => Err(WalkError::NoCommonAncestor { a: *a, b: *b }),
    }
}

/// Check if `ancestor` is reachable from `descendant` through parent links.
pub fn is_ancestor(
    odb: &ObjectDatabase,
    ancestor: &ObjectId,
    descendant: &ObjectId,
) -> Result<bool, WalkError> {
    if ancestor == descendant {
        return Ok(true);
    }

    let mut visited: HashSet<ObjectId> = HashSet::new();
    let mut queue: VecDeque<ObjectId> = VecDeque::new();
    visited.insert(*descendant);
    queue.push_back(*descendant);

    while let Some(current) = queue.pop_front() {
        if current == *ancestor {
            return Ok(true);
        }
        let commit = odb.read_commit(&current)?;
        for parent in &commit.parents {
            if visited.insert(*parent) {
                queue.push_back(*parent);
            }
        }
    }

    Ok(false)
}

/// BFS from `start`, recording each commit's depth. First visit wins.
fn generations_from(
    odb: &ObjectDatabase,
    start: &ObjectId,
) -> Result<HashMap<ObjectId, usize>, WalkError> {
    let mut generation: HashMap<ObjectId, usize> = HashMap::new();
    let mut queue: VecDeque<(ObjectId, usize)> = VecDeque::new();
    generation.insert(*start, 0);
    queue.push_back((*start, 0));

    while let Some((current, depth)) = queue.pop_front() {
        let commit = odb.read_commit(&current)?;
        for parent in &commit.parents {
            if !generation.contains_key(parent) {
                generation.insert(*parent, depth + 1);
                queue.push_back((*parent, depth + 1));
            }
        }
    }

    Ok(generation)
}
