//! File system utilities for staging the flashable zip.
//!
//! Provides file operations with automatic directory creation, symlink
//! preservation, and path-annotated errors.

use crate::error::{PackageError, Result};
use std::io;
use std::path::Path;
use tokio::fs;

fn staging(path: &Path) -> impl FnOnce(io::Error) -> PackageError + '_ {
    move |source| PackageError::Staging {
        path: path.to_path_buf(),
        source,
    }
}

/// Makes a symbolic link to a file or directory.
#[cfg(unix)]
fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a file or directory.
#[cfg(windows)]
fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.is_file() {
        return Err(staging(from)(io::Error::new(
            io::ErrorKind::NotFound,
            "not a regular file",
        ))
        .into());
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir).await.map_err(staging(dest_dir))?;
    }
    fs::copy(from, to).await.map_err(staging(from))?;
    Ok(())
}

/// Recursively copies a directory from one path to another, creating any
/// parent directories of the destination path as necessary.
///
/// Preserves symlinks on platforms that support them.
pub async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    if !from.is_dir() {
        return Err(staging(from)(io::Error::new(
            io::ErrorKind::NotFound,
            "not a directory",
        ))
        .into());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await.map_err(staging(parent))?;
    }

    for entry in walkdir::WalkDir::new(from) {
        let entry = entry.map_err(|e| PackageError::Staging {
            path: from.to_path_buf(),
            source: e.into(),
        })?;
        let rel_path = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| staging(entry.path())(io::Error::other(e)))?;
        let dest_path = to.join(rel_path);

        if entry.file_type().is_symlink() {
            let target = fs::read_link(entry.path())
                .await
                .map_err(staging(entry.path()))?;
            symlink(&target, &dest_path).map_err(staging(&dest_path))?;
        } else if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .await
                .map_err(staging(&dest_path))?;
        } else {
            fs::copy(entry.path(), &dest_path)
                .await
                .map_err(staging(entry.path()))?;
        }
    }

    Ok(())
}
