//! File persistence helpers shared by the run recorder and the dataset builder.
//!
//! Writes go to a temporary sibling file which is then renamed over the
//! target, so readers never observe a half-written document.

use std::io;
use std::path::{Path, PathBuf};

/// Atomically write `data` as pretty-printed JSON to `path`.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let mut json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
    json.push('\n');
    atomic_write(path, json.as_bytes())
}

/// Atomically write raw bytes to `path`, creating parent directories.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}

/// Read a JSON document. `Ok(None)` when the file does not exist.
pub fn load_json_value(path: &Path) -> io::Result<Option<serde_json::Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let value =
        serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}
