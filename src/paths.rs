use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub fn database_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("podtrack.db"))
}

pub fn log_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("podtrack.log"))
}

fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("podtrack"))
}

/// Opens `path` for appending, creating missing parent directories.
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

pub fn player_socket_path(generation: u64) -> PathBuf {
    std::env::temp_dir().join(format!(
        "podtrack-{}-{generation}.sock",
        std::process::id()
    ))
}
