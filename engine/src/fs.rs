//! Filesystem helpers for backups and scratch space.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Suffix of the aside copy kept while a destination is being overwritten.
pub const DELETE_CANDIDATE_SUFFIX: &str = ".deleteCandidate";

/// Returns `path` with `suffix` appended to its file name.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use store_ladder_engine::fs::append_suffix;
///
/// assert_eq!(
///     append_suffix(Path::new("data/Notes.sqlite"), ".backup"),
///     Path::new("data/Notes.sqlite.backup")
/// );
/// ```
pub fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Copies `source` to `destination`, replacing any existing file.
///
/// An existing destination is first renamed to
/// `<destination>.deleteCandidate`, so `destination` never holds a partial
/// copy next to a complete one. The aside copy is deleted once the fresh
/// copy is in place; if the copy fails it is moved back.
pub fn copy_and_overwrite(source: &Path, destination: &Path) -> io::Result<()> {
    let aside = append_suffix(destination, DELETE_CANDIDATE_SUFFIX);
    remove_file_if_exists(&aside)?;

    let had_destination = destination.exists();
    if had_destination {
        fs::rename(destination, &aside)?;
    }

    if let Err(err) = fs::copy(source, destination) {
        let _ = remove_file_if_exists(destination);
        if had_destination {
            let _ = fs::rename(&aside, destination);
        }
        return Err(err);
    }

    if had_destination {
        if let Err(err) = fs::remove_file(&aside) {
            warn!(path = %aside.display(), error = %err, "failed to delete stale copy");
        }
    }
    Ok(())
}

/// Removes a file, treating a missing file as success.
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Creates `path` and its parents unless it already exists.
pub fn create_dir_if_missing(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Moves `source` onto `destination`, replacing it.
pub fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    fs::rename(source, destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_and_overwrite_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("store");
        let destination = dir.path().join("store.backup");
        fs::write(&source, b"fresh").unwrap();
        fs::write(&destination, b"stale").unwrap();

        copy_and_overwrite(&source, &destination).unwrap();

        assert_eq!(fs::read(&destination).unwrap(), b"fresh");
        assert!(!append_suffix(&destination, DELETE_CANDIDATE_SUFFIX).exists());
        assert_eq!(fs::read(&source).unwrap(), b"fresh");
    }

    #[test]
    fn test_copy_failure_restores_previous_destination() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("store.backup");
        fs::write(&destination, b"stale").unwrap();

        let result = copy_and_overwrite(&dir.path().join("missing"), &destination);

        assert!(result.is_err());
        assert_eq!(fs::read(&destination).unwrap(), b"stale");
    }

    #[test]
    fn test_remove_file_if_exists_ignores_missing() {
        let dir = TempDir::new().unwrap();
        assert!(remove_file_if_exists(&dir.path().join("nothing")).is_ok());
    }
}
