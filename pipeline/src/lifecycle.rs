//! Pending-file discovery and post-commit archiving.
//!
//! The ledger decides what is loaded; the file system only holds inputs.
//! Moving a committed file out of the pending directory is housekeeping, so
//! an archive failure never undoes a load.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Moves a committed file out of the pending directory.
pub trait FileLifecycle {
    /// Archives `path` and returns where it now lives.
    fn archive(&self, path: &Path) -> io::Result<PathBuf>;
}

impl<T: FileLifecycle + ?Sized> FileLifecycle for &T {
    fn archive(&self, path: &Path) -> io::Result<PathBuf> {
        (**self).archive(path)
    }
}

/// Archives files by moving them into a single done directory.
#[derive(Debug, Clone)]
pub struct DirectoryArchiver {
    done_dir: PathBuf,
}

impl DirectoryArchiver {
    pub fn new(done_dir: impl Into<PathBuf>) -> Self {
        Self {
            done_dir: done_dir.into(),
        }
    }

    pub fn done_dir(&self) -> &Path {
        &self.done_dir
    }
}

impl FileLifecycle for DirectoryArchiver {
    /// Creates the done directory if needed and moves `path` into it.
    ///
    /// Falls back to copy and remove when a rename is not possible, such as
    /// across file systems. Never overwrites an archived file.
    fn archive(&self, path: &Path) -> io::Result<PathBuf> {
        let name = path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", path.display()),
            )
        })?;
        fs::create_dir_all(&self.done_dir)?;

        let target = self.done_dir.join(name);
        if target.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", target.display()),
            ));
        }

        if fs::rename(path, &target).is_ok() {
            return Ok(target);
        }
        fs::copy(path, &target)?;
        if let Err(err) = fs::remove_file(path) {
            // keep a single copy; the source stays pending
            let _ = fs::remove_file(&target);
            return Err(err);
        }
        Ok(target)
    }
}

/// Lists `*.json` files directly inside `dir`, sorted by file name.
///
/// A missing directory has no pending files.
pub fn pending_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "notes.txt", "c.JSON"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        let names: Vec<String> = pending_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.json", "b.json"]);
    }

    #[test]
    fn test_pending_files_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(pending_files(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn test_archive_moves_file_and_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.json");
        fs::write(&source, "{}").unwrap();

        let archiver = DirectoryArchiver::new(dir.path().join("historical"));
        let target = archiver.archive(&source).unwrap();

        assert!(!source.exists());
        assert_eq!(target, dir.path().join("historical").join("a.json"));
        assert_eq!(fs::read_to_string(target).unwrap(), "{}");
    }

    #[test]
    fn test_archive_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let done = dir.path().join("historical");
        fs::create_dir(&done).unwrap();
        fs::write(done.join("a.json"), "old").unwrap();
        let source = dir.path().join("a.json");
        fs::write(&source, "new").unwrap();

        let err = DirectoryArchiver::new(&done).archive(&source).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(source.exists());
        assert_eq!(fs::read_to_string(done.join("a.json")).unwrap(), "old");
    }
}
