//! Crash-safe file replacement.

use std::io::Write;
use std::path::Path;

/// Write `data` to a temporary file beside `path`, sync it, then move it over `path`.
///
/// Missing parent directories are created. Readers see either the old contents
/// or the new ones, never a partial write.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
