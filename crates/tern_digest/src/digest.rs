use md5::{Digest, Md5};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const CHUNK_SIZE: usize = 64 * 1024;

/// MD5 of a single file's bytes as lowercase hex, read in 64 KiB chunks.
///
/// Returns an empty string if the file cannot be read; callers treat empty
/// as "always needs refresh".
pub fn file_md5(path: &Path) -> String {
    hash_file(path).unwrap_or_default()
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Fingerprint of an entire asset folder.
///
/// Returns an empty string for an empty or unreadable directory.
pub fn folder_md5(dir: &Path) -> String {
    folder_md5_with(dir, file_md5)
}

/// Composition rule shared by the cached and uncached paths: every regular
/// file under `dir`, sorted by its forward-slash relative path, contributes
/// `<relative-path><file-md5>` to the digested string.
pub(crate) fn folder_md5_with(
    dir: &Path,
    mut file_digest: impl FnMut(&Path) -> String,
) -> String {
    let files = relative_files(dir);
    if files.is_empty() {
        return String::new();
    }

    let mut combined = String::new();
    for (rel, path) in &files {
        combined.push_str(rel);
        combined.push_str(&file_digest(path));
    }

    let mut hasher = Md5::new();
    hasher.update(combined.as_bytes());
    hex::encode(hasher.finalize())
}

fn relative_files(dir: &Path) -> Vec<(String, PathBuf)> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        files.push((rel, entry.path().to_path_buf()));
    }
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, contents: &[u8]) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn file_md5_known_value() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", b"hello world");
        assert_eq!(
            file_md5(&dir.path().join("a.txt")),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[test]
    fn file_md5_unreadable_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(file_md5(&dir.path().join("missing.bin")), "");
    }

    #[test]
    fn folder_md5_deterministic_across_layouts() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        for dir in [a.path(), b.path()] {
            write(dir, "model.pmx", b"model bytes");
            write(dir, "textures/skin.png", b"png bytes");
        }
        let digest = folder_md5(a.path());
        assert!(!digest.is_empty());
        assert_eq!(digest, folder_md5(b.path()));
        assert_eq!(digest, folder_md5(a.path()));
    }

    #[test]
    fn folder_md5_changes_on_content_change() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "model.pmx", b"model bytes");
        let before = folder_md5(dir.path());
        write(dir.path(), "model.pmx", b"model bytes!");
        assert_ne!(before, folder_md5(dir.path()));
    }

    #[test]
    fn folder_md5_changes_on_file_set_change() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "model.pmx", b"model bytes");
        let before = folder_md5(dir.path());
        write(dir.path(), "extra.txt", b"x");
        let with_extra = folder_md5(dir.path());
        assert_ne!(before, with_extra);
        fs::remove_file(dir.path().join("extra.txt")).unwrap();
        assert_eq!(before, folder_md5(dir.path()));
    }

    #[test]
    fn folder_md5_changes_on_rename() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", b"same bytes");
        let before = folder_md5(dir.path());
        fs::rename(dir.path().join("a.txt"), dir.path().join("b.txt")).unwrap();
        assert_ne!(before, folder_md5(dir.path()));
    }

    #[test]
    fn folder_md5_empty_dir_is_empty_string() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(folder_md5(dir.path()), "");
        assert_eq!(folder_md5(&dir.path().join("nonexistent")), "");
    }
}
