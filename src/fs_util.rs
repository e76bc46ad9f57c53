use crate::error::{PvmError, PvmResult};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively copies the contents of `src` into `dst`, overwriting files
/// that already exist. `dst` is created if needed.
pub fn copy_dir_all(src: &Path, dst: &Path) -> PvmResult<u64> {
    fs::create_dir_all(dst).map_err(|e| PvmError::fs("create", dst, e))?;

    let mut copied = 0u64;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            PvmError::fs("read", path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .unwrap_or_else(|_| entry.path());
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| PvmError::fs("create", &target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| PvmError::fs("create", parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| PvmError::fs("copy", entry.path(), e))?;
            copied += 1;
        }
    }

    tracing::debug!("Copied {} files from {} to {}", copied, src.display(), dst.display());
    Ok(copied)
}

/// Removes everything inside `dir` but keeps `dir` itself.
pub fn clear_dir_contents(dir: &Path) -> PvmResult<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(PvmError::fs("read", dir, e)),
    };

    for entry in entries {
        let path = entry.map_err(|e| PvmError::fs("read", dir, e))?.path();
        let result = if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| PvmError::fs("remove", &path, e))?;
    }
    Ok(())
}

/// Leaves `dir` existing and empty. Falls back to emptying it in place when
/// the directory itself cannot be removed (e.g. it is some shell's cwd).
pub fn reset_dir(dir: &Path) -> PvmResult<()> {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir) {
            tracing::warn!(
                "Could not remove {}: {}; clearing its contents instead",
                dir.display(),
                e
            );
            clear_dir_contents(dir)?;
        }
    }
    fs::create_dir_all(dir).map_err(|e| PvmError::fs("create", dir, e))
}

pub fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}
