//! Crash-safe file replacement.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Replace `path` with `contents` without ever exposing a partially written file.
///
/// The data is written to a temporary file in the destination directory,
/// flushed to disk, then renamed over the target. A crash at any point leaves
/// either the old file or the new one, never a truncated mix. Missing parent
/// directories are created.
///
/// # Errors
///
/// Returns the underlying I/O error if the directory cannot be created or the
/// temporary file cannot be written, synced or renamed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    log::trace!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}
