use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes `text` next to `path` first and renames it into place, so readers
/// never observe a half-written save.
pub(crate) fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    if let Err(error) = write_synced(&tmp_path, text.as_bytes()) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    replace_file(&tmp_path, path)
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn replace_file(tmp_path: &Path, final_path: &Path) -> io::Result<()> {
    let first_error = match fs::rename(tmp_path, final_path) {
        Ok(()) => return Ok(()),
        Err(error) => error,
    };

    // some platforms refuse to rename over an existing file
    let retried = match fs::remove_file(final_path) {
        Ok(()) => fs::rename(tmp_path, final_path),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Err(first_error),
        Err(error) => Err(error),
    };
    if retried.is_err() {
        let _ = fs::remove_file(tmp_path);
    }
    retried
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("save.json");
    let tmp_name = format!(".{file_name}.{}.tmp", std::process::id());
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}
