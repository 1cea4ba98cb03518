//! Temp-file naming, cleanup and publish for atomic saves.
//!
//! The temp file lives next to the destination so the final rename never
//! crosses a filesystem boundary.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// 32 random bits rendered as 8 lowercase hex digits.
pub(crate) fn uniqid() -> String {
    let bits = Uuid::new_v4().as_u128() as u32;
    hex::encode(bits.to_be_bytes())
}

/// Names tried before giving up on finding an unused temp file.
const CREATE_ATTEMPTS: usize = 16;

/// `<dir>/<stem>-<suffix>.tmp` for a destination `<dir>/<stem>.<ext>`.
fn temp_path_with(destination: &Path, suffix: &str) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!("{stem}-{suffix}.tmp"))
}

/// Create a fresh temp file next to `destination`.
///
/// The file is opened with `create_new`, so a name already held by another
/// writer is never truncated; a fresh suffix is drawn instead.
pub(crate) fn create_temp(destination: &Path) -> io::Result<(TempFileGuard, File)> {
    create_temp_with(destination, uniqid)
}

fn create_temp_with(
    destination: &Path,
    mut next_suffix: impl FnMut() -> String,
) -> io::Result<(TempFileGuard, File)> {
    for _ in 0..CREATE_ATTEMPTS {
        let path = temp_path_with(destination, &next_suffix());
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((TempFileGuard::new(path), file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "Temp file name taken, drawing another");
            }
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no unused temp file name after {CREATE_ATTEMPTS} attempts"),
    ))
}

/// Replace `destination` with `source` in one rename.
///
/// `std::fs::rename` overwrites an existing destination on every supported
/// platform, so readers see either the old file or the new one.
pub(crate) fn publish(source: &Path, destination: &Path) -> io::Result<()> {
    fs::rename(source, destination)
}

/// Removes its temp file when dropped, if the file still exists.
#[derive(Debug)]
pub(crate) struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed leftover temp file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove temp file"
            ),
        }
    }
}
