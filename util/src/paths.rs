use crate::config::AppConfig;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Create a directory (and all parents) if it doesn't exist, and return the path.
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> io::Result<PathBuf> {
    let p = path.as_ref();
    fs::create_dir_all(p)?;
    Ok(p.to_path_buf())
}

/// Ensure the parent directory of a *file path* exists (no-op if none).
pub fn ensure_parent_dir<P: AsRef<Path>>(file_path: P) -> io::Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Global storage root (absolute), from `AppConfig::storage_root`.
/// If relative in env, resolve against current_dir().
pub fn storage_root() -> PathBuf {
    let root = AppConfig::global().storage_root.clone();
    let p = PathBuf::from(root);
    if p.is_absolute() {
        p
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(p)
    }
}

/// Persisted reference reports: {STORAGE_ROOT}/solutions
pub fn solution_cache_dir() -> PathBuf {
    storage_root().join("solutions")
}

/// One cached reference report: {STORAGE_ROOT}/solutions/{stem}-{fingerprint}.json
pub fn solution_cache_path(stem: &str, fingerprint: &str) -> PathBuf {
    solution_cache_dir().join(format!("{stem}-{fingerprint}.json"))
}

/// Log files: {STORAGE_ROOT}/logs
pub fn logs_dir() -> PathBuf {
    storage_root().join("logs")
}
