use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append `line` to `path` unless an identical line is already present.
/// Creates the file and its parent directories when missing. Returns true when appended.
pub fn ensure_line_in_file(path: &Path, line: &str) -> io::Result<bool> {
    let existing = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };
    if existing.lines().any(|l| l.trim() == line) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        f.write_all(b"\n")?;
    }
    writeln!(f, "{line}")?;
    Ok(true)
}

/// Replace `path` with `contents` via a sibling temp file and rename.
pub fn write_replace(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::other(format!("no parent directory for {}", path.display())))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".git-parallel-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Recursively delete a directory; a missing directory is not an error.
pub fn remove_dir_force(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Immediate child directories of `dir`, sorted by name. Missing or unreadable dir yields empty.
pub fn child_dirs_sorted(dir: &Path) -> Vec<PathBuf> {
    let Ok(rd) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut out: Vec<PathBuf> = rd
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    out.sort();
    out
}

/// True when `path` is an existing directory we can list, and when `need_write`, not read-only.
pub fn is_accessible_dir(path: &Path, need_write: bool) -> bool {
    let Ok(md) = fs::metadata(path) else {
        return false;
    };
    if !md.is_dir() || fs::read_dir(path).is_err() {
        return false;
    }
    !(need_write && md.permissions().readonly())
}

/// Compare two paths after best-effort canonicalization.
pub fn same_path(a: &Path, b: &Path) -> bool {
    let ca = fs::canonicalize(a).unwrap_or_else(|_| a.to_path_buf());
    let cb = fs::canonicalize(b).unwrap_or_else(|_| b.to_path_buf());
    ca == cb
}
