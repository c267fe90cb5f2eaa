use std::{fs, io, path::Path};

use log::info;
use walkdir::WalkDir;

use crate::OrchestratorError;

/// Copies the contents of `src` into `dst`, recursively, creating `dst` if needed.
///
/// # Returns
/// The amount of files copied.
///
/// # Errors
/// `OrchestratorError::InvalidConfig` if `dst` lies inside `src`, `OrchestratorError::Io` on any
/// filesystem failure.
pub fn copy_recursive(src: &Path, dst: &Path) -> Result<u64, OrchestratorError> {
    if dst.starts_with(src) {
        return Err(OrchestratorError::InvalidConfig(format!(
            "can't export {} into itself ({})",
            src.display(),
            dst.display()
        )));
    }

    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    info!(files = copied; "exported {} to {}", src.display(), dst.display());
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_nested_directories() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::write(src.path().join("model.safetensors"), b"weights").unwrap();
        fs::create_dir(src.path().join("extra")).unwrap();
        fs::write(src.path().join("extra/notes.txt"), b"notes").unwrap();

        let target = dst.path().join("export");
        assert_eq!(copy_recursive(src.path(), &target).unwrap(), 2);
        assert_eq!(fs::read(target.join("model.safetensors")).unwrap(), b"weights");
        assert_eq!(fs::read(target.join("extra/notes.txt")).unwrap(), b"notes");
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_directories() {
        let src = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::write(elsewhere.path().join("tokens.json"), b"{}").unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), src.path().join("linked")).unwrap();

        let target = dst.path().join("export");
        assert_eq!(copy_recursive(src.path(), &target).unwrap(), 1);
        assert!(target.join("linked").is_dir());
        assert_eq!(fs::read(target.join("linked/tokens.json")).unwrap(), b"{}");
    }

    #[test]
    fn refuses_to_copy_into_itself() {
        let src = tempfile::tempdir().unwrap();
        assert!(matches!(
            copy_recursive(src.path(), &src.path().join("inner")),
            Err(OrchestratorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_source_is_an_io_error() {
        let dst = tempfile::tempdir().unwrap();
        let missing = dst.path().join("missing");
        assert!(matches!(
            copy_recursive(&missing, &dst.path().join("out")),
            Err(OrchestratorError::Io(_))
        ));
    }
}
