//! The merge driver: preconditions, fast-forward detection, and the
//! three-way merge state machine.

use vec_object::{Commit, Object};
use vec_repository::Repository;
use vec_revwalk::{merge_base, MergeBaseCache};

use crate::tree::merge_trees;
use crate::{MergeError, MergeOptions, MergeOutcome};

/// Merge `source` into the current branch.
///
/// Preconditions: HEAD resolves to a born branch, `source` exists and is a
/// different branch, and the working tree is clean. Outcomes:
///
/// - base == HEAD → fast-forward: the source tree is checked out and the
///   current branch advances; no merge commit.
/// - base == source → already up to date; nothing changes.
/// - otherwise a three-way merge runs. Conflicts persist the conflicted
///   index and working tree and report [`MergeOutcome::Conflicted`]
///   without creating a commit; a clean merge builds the tree from the
///   index and commits with both parents.
pub fn merge_branch(
    repo: &Repository,
    source: &str,
    options: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    let current = repo.refs().current_branch()?;
    if current == source {
        return Err(MergeError::SameBranch(current));
    }

    let head_tip = repo
        .refs()
        .head_target()?
        .ok_or_else(|| MergeError::UnbornBranch(current.clone()))?;
    let source_tip = repo.refs().read_branch(source)?;

    if !repo.status_is_clean()? {
        return Err(MergeError::DirtyWorkingTree);
    }

    let cache = MergeBaseCache::new(repo.merge_base_cache_dir());
    let base = merge_base(repo.odb(), &head_tip, &source_tip, Some(&cache))?;

    if base == head_tip {
        // HEAD is an ancestor of the source: advance without a commit.
        let source_tree = repo.odb().read_commit(&source_tip)?.tree;
        repo.checkout_tree(&source_tree)?;
        let who = identity_for_reflog(repo);
        repo.refs().update_branch(
            &current,
            &source_tip,
            &who,
            &format!("merge {source}: fast-forward"),
        )?;
        return Ok(MergeOutcome::FastForward {
            new_head: source_tip,
        });
    }

    if base == source_tip {
        return Ok(MergeOutcome::AlreadyUpToDate);
    }

    let base_tree = repo.odb().read_commit(&base)?.tree;
    let ours_commit = repo.odb().read_commit(&head_tip)?;
    let theirs_tree = repo.odb().read_commit(&source_tip)?.tree;

    let mut index = repo.load_index()?;
    let result = merge_trees(
        repo,
        &mut index,
        &base_tree,
        &ours_commit.tree,
        &theirs_tree,
        options,
    )?;

    // Persist the post-merge state in either case; every object the index
    // references was stored before this point.
    index.write_to(repo.index_path())?;

    if !result.is_clean() {
        return Ok(MergeOutcome::Conflicted {
            conflicts: result.conflicts,
        });
    }

    let tree = index.write_tree(repo.odb())?;

    // Author is inherited from the ours tip; the committer is the
    // configured identity, falling back to that author.
    let author = ours_commit.author.clone();
    let committer = repo.identity().unwrap_or_else(|_| author.clone());

    let commit = Commit {
        tree,
        parents: vec![head_tip, source_tip],
        author,
        committer: committer.clone(),
        timestamp: vec_utils::date::Timestamp::now().seconds,
        message: format!("Merge branch '{source}' into {current}"),
    };
    let commit_oid = repo.odb().write(&Object::Commit(commit))?;

    repo.refs().update_branch(
        &current,
        &commit_oid,
        &committer,
        &format!("merge {source}: merge made by the {} strategy", options.strategy.name()),
    )?;

    Ok(MergeOutcome::Merged { commit: commit_oid })
}

fn identity_for_reflog(repo: &Repository) -> String {
    repo.identity().unwrap_or_else(|_| "vecr".into())
}
