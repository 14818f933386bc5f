//! Streaming tar extraction into a destination directory.
//!
//! Entries are read one at a time and written straight to disk in archive
//! order. Each file handle is closed as soon as its content is copied.
//!
//! Entry paths are always taken relative to the destination: leading `/` and
//! `.` components are dropped, while a `..` component, a parent directory
//! that is a symlink or a directory entry that lands on a symlink stops the
//! unpack with [`UnpackError::UnsafePath`].

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::bufread::GzDecoder;
use log::{debug, trace};
use tar_rs as tar;

use crate::error::UnpackError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// What an unpack wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackStats {
    pub directories: u64,
    pub files: u64,
    pub links: u64,
    pub skipped: u64,
    pub bytes: u64,
}

/// Unpacks a plain or gzip-compressed tar stream into `dest`.
///
/// `dest` must already exist. Stops at the first malformed entry or I/O
/// failure; whatever was written before that point stays on disk.
pub fn unpack<R: Read>(reader: R, dest: &Path) -> Result<UnpackStats, UnpackError> {
    let mut reader = BufReader::new(reader);
    let compressed = reader
        .fill_buf()
        .map_err(UnpackError::Archive)?
        .starts_with(&GZIP_MAGIC);

    if compressed {
        debug!("Archive stream is gzip compressed");
        unpack_archive(tar::Archive::new(GzDecoder::new(reader)), dest)
    } else {
        unpack_archive(tar::Archive::new(reader), dest)
    }
}

fn unpack_archive<R: Read>(
    mut archive: tar::Archive<R>,
    dest: &Path,
) -> Result<UnpackStats, UnpackError> {
    let mut stats = UnpackStats::default();
    let mut directories = Vec::new();

    for entry in archive.entries().map_err(UnpackError::Archive)? {
        let mut entry = entry.map_err(UnpackError::Archive)?;
        let raw_path = entry.path().map_err(UnpackError::Archive)?.into_owned();

        let Some(relative) = relative_entry_path(&raw_path)? else {
            trace!("Skipping archive root entry {}", raw_path.display());
            continue;
        };
        check_parents(dest, &relative)?;
        let target = dest.join(&relative);

        let entry_type = entry.header().entry_type();
        let mode = entry.header().mode().map_err(UnpackError::Archive)? & 0o7777;

        match entry_type {
            tar::EntryType::Directory => {
                reject_symlink(&target, &relative)?;
                create_dir_all(&target, mode)?;
                // A previous run may have left it read-only.
                set_mode(&target, mode | 0o700)?;
                directories.push((target, mode));
                stats.directories += 1;
            }
            tar::EntryType::Symlink => {
                let link = link_name(&entry)?;
                ensure_parent(&target)?;
                remove_existing(&target)?;
                create_symlink(&link, &target)?;
                stats.links += 1;
            }
            tar::EntryType::Link => {
                let link = link_name(&entry)?;
                let Some(source) = relative_entry_path(&link)? else {
                    return Err(UnpackError::UnsafePath {
                        path: raw_path,
                        reason: "hard link points at the archive root",
                    });
                };
                check_parents(dest, &source)?;
                ensure_parent(&target)?;
                link_or_copy(&dest.join(source), &target)?;
                stats.links += 1;
            }
            tar::EntryType::Char | tar::EntryType::Block | tar::EntryType::Fifo => {
                debug!("Skipping special file {}", relative.display());
                stats.skipped += 1;
            }
            tar::EntryType::XGlobalHeader => {
                stats.skipped += 1;
            }
            _ => {
                ensure_parent(&target)?;
                remove_existing_file(&target)?;
                stats.bytes += write_file(&mut entry, &target, mode)?;
                stats.files += 1;
            }
        }
    }

    // Deepest first, so a read-only directory cannot block writes into itself.
    directories.sort_by(|a, b| b.0.cmp(&a.0));
    for (path, mode) in directories {
        set_mode(&path, mode)?;
    }

    debug!(
        "Unpacked {} directories, {} files, {} links ({} bytes) into {}",
        stats.directories,
        stats.files,
        stats.links,
        stats.bytes,
        dest.display()
    );
    Ok(stats)
}

/// Strips root and `.` components. `None` for an entry naming the root itself.
fn relative_entry_path(path: &Path) -> Result<Option<PathBuf>, UnpackError> {
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                return Err(UnpackError::UnsafePath {
                    path: path.to_path_buf(),
                    reason: "path contains a parent directory component",
                })
            }
            Component::Normal(part) => relative.push(part),
        }
    }

    Ok((!relative.as_os_str().is_empty()).then_some(relative))
}

/// Rejects entries whose existing parent directories include a symlink, which
/// would let a write land outside `dest`.
fn check_parents(dest: &Path, relative: &Path) -> Result<(), UnpackError> {
    let Some(parent) = relative.parent() else {
        return Ok(());
    };

    let mut current = dest.to_path_buf();
    for component in parent.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(UnpackError::UnsafePath {
                    path: relative.to_path_buf(),
                    reason: "a parent directory is a symbolic link",
                })
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(UnpackError::io("inspect", current, e)),
        }
    }
    Ok(())
}

fn link_name<R: Read>(entry: &tar::Entry<'_, R>) -> Result<PathBuf, UnpackError> {
    let path = entry.path().map_err(UnpackError::Archive)?.into_owned();
    entry
        .link_name()
        .map_err(UnpackError::Archive)?
        .map(|link| link.into_owned())
        .ok_or_else(|| {
            UnpackError::Archive(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("link entry {} has no target", path.display()),
            ))
        })
}

/// Archives do not always list parent directories before their children.
fn ensure_parent(target: &Path) -> Result<(), UnpackError> {
    match target.parent() {
        Some(parent) if !parent.is_dir() => create_dir_all(parent, 0o755),
        _ => Ok(()),
    }
}

fn remove_existing(target: &Path) -> Result<(), UnpackError> {
    match fs::symlink_metadata(target) {
        Ok(metadata) if metadata.is_dir() => {
            fs::remove_dir_all(target).map_err(|e| UnpackError::io("remove", target, e))
        }
        Ok(_) => fs::remove_file(target).map_err(|e| UnpackError::io("remove", target, e)),
        Err(_) => Ok(()),
    }
}

/// Directory modes are set through the path, so it must not be a symlink.
fn reject_symlink(target: &Path, relative: &Path) -> Result<(), UnpackError> {
    match fs::symlink_metadata(target) {
        Ok(metadata) if metadata.file_type().is_symlink() => Err(UnpackError::UnsafePath {
            path: relative.to_path_buf(),
            reason: "directory entry is a symbolic link",
        }),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(UnpackError::io("inspect", target, e)),
    }
}

/// A file entry replaces whatever non-directory sits at its path: symlinks are
/// not written through and read-only files need no write permission.
fn remove_existing_file(target: &Path) -> Result<(), UnpackError> {
    match fs::symlink_metadata(target) {
        Ok(metadata) if !metadata.is_dir() => {
            fs::remove_file(target).map_err(|e| UnpackError::io("remove", target, e))
        }
        _ => Ok(()),
    }
}

fn write_file<R: Read>(entry: &mut R, target: &Path, mode: u32) -> Result<u64, UnpackError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options
        .open(target)
        .map_err(|e| UnpackError::io("create file", target, e))?;
    let written =
        io::copy(entry, &mut file).map_err(|e| UnpackError::io("write file", target, e))?;
    drop(file);

    set_mode(target, mode)?;
    Ok(written)
}

fn link_or_copy(source: &Path, target: &Path) -> Result<(), UnpackError> {
    if source == target {
        return Ok(());
    }
    remove_existing(target)?;

    if let Err(e) = fs::hard_link(source, target) {
        debug!(
            "hardlink failed ({}), falling back to copy: {} -> {}",
            e,
            source.display(),
            target.display()
        );
        fs::copy(source, target).map_err(|e| UnpackError::io("link", target, e))?;
    }
    Ok(())
}

#[cfg(unix)]
fn create_dir_all(path: &Path, mode: u32) -> Result<(), UnpackError> {
    use std::os::unix::fs::DirBuilderExt;
    // Owner needs write access while children are unpacked; the entry's own
    // mode is applied once the archive is done.
    fs::DirBuilder::new()
        .recursive(true)
        .mode(mode | 0o700)
        .create(path)
        .map_err(|e| UnpackError::io("create directory", path, e))
}

#[cfg(not(unix))]
fn create_dir_all(path: &Path, _mode: u32) -> Result<(), UnpackError> {
    fs::create_dir_all(path).map_err(|e| UnpackError::io("create directory", path, e))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), UnpackError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| UnpackError::io("set permissions on", path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), UnpackError> {
    Ok(())
}

#[cfg(unix)]
fn create_symlink(link: &Path, target: &Path) -> Result<(), UnpackError> {
    std::os::unix::fs::symlink(link, target).map_err(|e| UnpackError::io("create symlink", target, e))
}

#[cfg(not(unix))]
fn create_symlink(link: &Path, target: &Path) -> Result<(), UnpackError> {
    log::warn!(
        "Symlink support not implemented on this platform: {} -> {}",
        target.display(),
        link.display()
    );
    Ok(())
}
