use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("destination is not a usable file path: {0}")]
    Destination(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Writes `bytes` to `target` through a temp file in the same directory, so
/// readers never see a partial archive.
pub fn write_atomically(target: &Path, bytes: &[u8]) -> Result<PathBuf, PersistError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if target.file_name().is_none() {
        return Err(PersistError::Destination(target.display().to_string()));
    }
    if dir.exists() && !dir.is_dir() {
        return Err(PersistError::Destination(format!(
            "{} is not a directory",
            dir.display()
        )));
    }
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(target).map_err(|err| PersistError::Io(err.error))?;
    Ok(target.to_path_buf())
}

/// `<dir>/<workspace>.zip` when `destination` is an existing directory.
pub fn archive_path(destination: &Path, workspace: &str) -> PathBuf {
    if destination.is_dir() {
        let file = workspace.rsplit('/').next().unwrap_or(workspace);
        destination.join(format!("{file}.zip"))
    } else {
        destination.to_path_buf()
    }
}
