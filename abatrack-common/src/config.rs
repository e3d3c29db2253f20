//! Configuration loading and data directory resolution

use std::path::{Path, PathBuf};

use crate::Result;

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "abatrack.db";

/// Resolve the data directory, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. `ABATRACK_DATA` environment variable
/// 3. OS-dependent default (fallback)
pub fn resolve_data_dir(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var("ABATRACK_DATA") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    default_data_dir()
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("abatrack"))
        .unwrap_or_else(|| PathBuf::from("./abatrack_data"))
}

/// Create the data directory if missing and return the database path
pub fn ensure_data_dir(data_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join(DATABASE_FILE))
}
