use std::fs;
use std::io::Write;
use std::path::Path;

use fpp_core::errors::{ErrorInfo, FppError};
use tempfile::NamedTempFile;

fn io_error(code: &str, path: &Path, err: impl ToString) -> FppError {
    FppError::Io(ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()))
}

/// Writes `bytes` to a temporary file next to `path` and renames it into
/// place, so readers never observe a partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FppError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| io_error("artifact_dir", parent, err))?;
    let mut tmp = NamedTempFile::new_in(parent).map_err(|err| io_error("artifact_tmp", path, err))?;
    tmp.write_all(bytes)
        .map_err(|err| io_error("artifact_write", path, err))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| io_error("artifact_sync", path, err))?;
    tmp.persist(path)
        .map_err(|err| io_error("artifact_persist", path, err.error))?;
    Ok(())
}
