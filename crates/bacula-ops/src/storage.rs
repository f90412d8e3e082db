//! Filesystem helpers shared by the state file, the secret store and the
//! configuration reconciler.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Move a file from `src` to `dst`. Uses `rename` first (atomic on the same
/// filesystem) and falls back to copy + delete for cross-device moves.
pub fn move_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst)?;
    std::fs::remove_file(src)?;
    Ok(())
}

/// Creates the parent directory of `path` if it does not exist yet.
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Path used to stage `path` before it is moved into place.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Writes `content` next to `path` and renames it over `path`, so readers
/// only ever see the old or the new content.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    ensure_parent(path)?;
    let staged = staging_path(path);

    {
        let mut file = std::fs::File::create(&staged)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    if let Err(e) = move_file(&staged, path) {
        let _ = std::fs::remove_file(&staged);
        return Err(e);
    }
    Ok(())
}

/// Reads a file as UTF-8, treating a missing file as empty.
pub fn read_or_empty(path: &Path) -> std::io::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}

/// Writes an executable (mode 0755) file unless it already holds
/// `content`. Returns true if the file was written.
pub fn write_executable(path: &Path, content: &str) -> std::io::Result<bool> {
    if path.exists() && read_or_empty(path)? == content {
        let mode = std::fs::metadata(path)?.permissions().mode() & 0o777;
        if mode == 0o755 {
            return Ok(false);
        }
    } else {
        write_atomic(path, content.as_bytes())?;
    }
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(true)
}
