use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::PullerError;

/// Makes sure `path` is a directory we can unpack into and returns it absolute.
///
/// A missing path is created as a single directory (mode 0755, parents are not
/// created). An existing path must already be a directory; its contents are
/// left alone.
pub fn ensure_rootfs_dir(path: &Path) -> Result<PathBuf, PullerError> {
    let invalid = |reason: String| PullerError::DestinationInvalid {
        path: path.to_path_buf(),
        reason,
    };

    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map_err(|e| invalid(format!("unable to resolve the current directory: {}", e)))?
            .join(path)
    };

    match fs::metadata(&path) {
        Ok(metadata) if metadata.is_dir() => {
            debug!("Reusing rootfs directory {}", path.display());
            Ok(path)
        }
        Ok(_) => Err(invalid("path is not a directory".to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            create_dir(&path).map_err(|e| invalid(format!("unable to create directory: {}", e)))?;
            debug!("Created rootfs directory {}", path.display());
            Ok(path)
        }
        Err(e) => Err(invalid(format!("unable to stat the given directory: {}", e))),
    }
}

#[cfg(unix)]
fn create_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().mode(0o755).create(path)
}

#[cfg(not(unix))]
fn create_dir(path: &Path) -> io::Result<()> {
    fs::create_dir(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_missing_directory() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("rootfs");

        let resolved = ensure_rootfs_dir(&target).unwrap();
        assert_eq!(resolved, target);
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_accepts_existing_directory_and_keeps_contents() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("keep.txt"), "data").unwrap();

        ensure_rootfs_dir(temp.path()).unwrap();
        assert_eq!(
            fs::read_to_string(temp.path().join("keep.txt")).unwrap(),
            "data"
        );
    }

    #[test]
    fn test_rejects_regular_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("rootfs");
        fs::write(&file, "not a dir").unwrap();

        let err = ensure_rootfs_dir(&file).unwrap_err();
        assert!(matches!(err, PullerError::DestinationInvalid { .. }));
        assert!(file.is_file());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_does_not_create_parents() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("missing").join("rootfs");

        let err = ensure_rootfs_dir(&nested).unwrap_err();
        assert!(err.to_string().contains("unable to create directory"));
        assert!(!temp.path().join("missing").exists());
    }
}
