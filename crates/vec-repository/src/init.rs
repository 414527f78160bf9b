use std::fs;
use std::path::{Path, PathBuf};

use crate::{RepoError, VEC_DIR};

/// Initialize the `.vec` structure under `work_tree`:
/// - HEAD (pointing at the default branch)
/// - config skeleton
/// - objects/, objects/info/, objects/pack/
/// - refs/heads/
/// - logs/
///
/// Re-running init on an existing repository is a safe no-op; existing
/// data is never overwritten.
pub fn init_repository(work_tree: &Path) -> Result<PathBuf, RepoError> {
    let vec_dir = work_tree.join(VEC_DIR);

    if vec_dir.join("HEAD").is_file() {
        return Ok(vec_dir);
    }

    fs::create_dir_all(vec_dir.join("objects").join("info"))?;
    fs::create_dir_all(vec_dir.join("objects").join("pack"))?;
    fs::create_dir_all(vec_dir.join("refs").join("heads"))?;
    fs::create_dir_all(vec_dir.join("logs"))?;

    fs::write(vec_dir.join("HEAD"), "ref: refs/heads/main\n")?;
    fs::write(
        vec_dir.join("config"),
        "[core]\n\trepositoryformatversion = 0\n\tbare = false\n",
    )?;

    Ok(vec_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let vec_dir = init_repository(dir.path()).unwrap();

        assert!(vec_dir.join("objects/info").is_dir());
        assert!(vec_dir.join("objects/pack").is_dir());
        assert!(vec_dir.join("refs/heads").is_dir());
        assert!(vec_dir.join("logs").is_dir());
        assert_eq!(
            fs::read_to_string(vec_dir.join("HEAD")).unwrap(),
            "ref: refs/heads/main\n"
        );
        assert!(fs::read_to_string(vec_dir.join("config"))
            .unwrap()
            .contains("[core]"));
    }

    #[test]
    fn reinit_preserves_existing_state() {
        let dir = tempfile::tempdir().unwrap();
        let vec_dir = init_repository(dir.path()).unwrap();
        fs::write(vec_dir.join("HEAD"), "ref: refs/heads/other\n").unwrap();

        init_repository(dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(vec_dir.join("HEAD")).unwrap(),
            "ref: refs/heads/other\n"
        );
    }
}
