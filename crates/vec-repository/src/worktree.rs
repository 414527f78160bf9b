//! Working-tree materialization.

use bstr::ByteSlice;
use vec_hash::ObjectId;
use vec_index::{Index, Stage};
use vec_object::FileMode;

use crate::{RepoError, Repository};

/// Materialize `tree` into the working tree and reset the index to match.
///
/// Paths currently in the index but absent from the target tree are removed
/// from the working tree (with now-empty parent directories pruned); every
/// file in the target tree is written out and staged fresh.
pub fn checkout_tree(repo: &Repository, tree: &ObjectId) -> Result<(), RepoError> {
    let target = repo.odb().flatten_tree(tree)?;
    let old_index = repo.load_index()?;

    // Remove tracked files that vanish in the target tree.
    for entry in old_index.entries() {
        if entry.stage != Stage::Normal {
            continue;
        }
        if !target.contains_key(entry.path.as_bstr()) {
            let fs_path = repo.work_tree().join(entry.path.to_str_lossy().as_ref());
            match std::fs::remove_file(&fs_path) {
                Ok(()) => prune_empty_dirs(repo, fs_path.parent()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(RepoError::Io(e)),
            }
        }
    }

    // Write target files and rebuild the index from scratch.
    let mut index = Index::new();
    for (path, flat) in &target {
        let blob = repo.odb().read_blob(&flat.oid)?;
        let fs_path = repo.work_tree().join(path.to_str_lossy().as_ref());
        if let Some(parent) = fs_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&fs_path, &blob.data)?;
        apply_mode(&fs_path, flat.mode)?;

        index.add(path.clone(), flat.oid, flat.mode, repo.work_tree())?;
    }
    index.write_to(repo.index_path())?;

    Ok(())
}

/// Remove now-empty directories up to (not including) the work tree root.
fn prune_empty_dirs(repo: &Repository, mut dir: Option<&std::path::Path>) {
    while let Some(d) = dir {
        if d == repo.work_tree() {
            break;
        }
        // Stops at the first non-empty directory.
        if std::fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

#[cfg(unix)]
fn apply_mode(path: &std::path::Path, mode: FileMode) -> Result<(), RepoError> {
    use std::os::unix::fs::PermissionsExt;
    let bits = match mode {
        FileMode::Executable => 0o755,
        _ => 0o644,
    };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(bits))?;
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &std::path::Path, _mode: FileMode) -> Result<(), RepoError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::tests::init_with_identity;
    use crate::Repository;

    fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str) -> vec_hash::ObjectId {
        for (path, content) in files {
            let fs_path = repo.work_tree().join(path);
            if let Some(parent) = fs_path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&fs_path, content).unwrap();
            repo.stage_file(path).unwrap();
        }
        repo.commit(message).unwrap()
    }

    #[test]
    fn checkout_restores_old_tree() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_identity(dir.path());

        let first = commit_files(&repo, &[("a.txt", "one\n"), ("sub/b.txt", "two\n")], "first");
        commit_files(&repo, &[("a.txt", "changed\n"), ("new.txt", "fresh\n")], "second");

        let first_tree = repo.odb().read_commit(&first).unwrap().tree;
        repo.checkout_tree(&first_tree).unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "one\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("sub/b.txt")).unwrap(),
            "two\n"
        );
        assert!(!dir.path().join("new.txt").exists());
    }

    #[test]
    fn checkout_prunes_emptied_directories() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_identity(dir.path());

        let bare = commit_files(&repo, &[("keep.txt", "k\n")], "bare");
        commit_files(&repo, &[("deep/nest/file.txt", "d\n")], "nested");

        let bare_tree = repo.odb().read_commit(&bare).unwrap().tree;
        repo.checkout_tree(&bare_tree).unwrap();

        assert!(!dir.path().join("deep").exists());
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn checkout_branch_switches_content_and_head() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_identity(dir.path());

        commit_files(&repo, &[("file.txt", "main content\n")], "on main");
        repo.create_branch("feature").unwrap();
        repo.checkout_branch("feature").unwrap();
        commit_files(&repo, &[("file.txt", "feature content\n")], "on feature");

        repo.checkout_branch("main").unwrap();
        assert_eq!(repo.refs().current_branch().unwrap(), "main");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("file.txt")).unwrap(),
            "main content\n"
        );

        repo.checkout_branch("feature").unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("file.txt")).unwrap(),
            "feature content\n"
        );
    }

    #[test]
    fn dirty_tree_blocks_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_identity(dir.path());

        commit_files(&repo, &[("file.txt", "v1\n")], "first");
        repo.create_branch("side").unwrap();

        std::fs::write(dir.path().join("extra.txt"), "unstaged").unwrap();
        repo.stage_file("extra.txt").unwrap();

        assert!(matches!(
            repo.checkout_branch("side"),
            Err(crate::RepoError::DirtyWorkingTree)
        ));
    }
}
