//! Crash-safe file primitives
//!
//! Every file the pipeline produces is written to a temporary file in the
//! destination directory, synced, renamed over the destination and followed
//! by a sync of the directory itself. A reader therefore sees either the
//! previous state or the complete new file, never a partial one.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

const STAGING_PREFIX: &str = ".cubeport-";

/// Open a temporary file next to `path`. Dropping it without [`commit`]
/// removes it.
pub fn staging_file(path: &Path) -> io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(".tmp")
        .tempfile_in(parent_dir(path))
}

/// Sync a staged file and atomically move it to `path`
pub fn commit(staged: NamedTempFile, path: &Path) -> io::Result<()> {
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    sync_dir(parent_dir(path))
}

/// Write `bytes` to `path` durably
pub fn write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut staged = staging_file(path)?;
    staged.write_all(bytes)?;
    commit(staged, path)
}

/// Delete `path` and sync its directory so the removal survives a crash
pub fn remove(path: &Path) -> io::Result<()> {
    fs::remove_file(path)?;
    sync_dir(parent_dir(path))
}

/// Whether `name` is a leftover staging file from an interrupted write
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

// Directory handles cannot be synced on this platform; rename is the barrier.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
