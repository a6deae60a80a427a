//! # tern archive codec
//!
//! Packs a directory subtree into a single gzip-compressed tar stream and
//! unpacks such a stream back into a directory subtree, preserving relative
//! paths. Entry names use forward-slash separators. Extraction tolerates
//! interleaved file and directory entries in any order and overwrites
//! existing files at the target path.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder};
use tracing::warn;
use walkdir::WalkDir;

/// One archive entry name as seen by the ingestion layer.
///
/// Directory entries carry a trailing `/` in `name` so layout analysis can
/// distinguish them from bare files without touching the header again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Pack all regular files under `dir` into a tar.gz byte buffer.
///
/// Entries are keyed by their path relative to `dir` and walked in sorted
/// order, so packing the same tree twice yields the same archive.
pub fn pack(dir: &Path) -> io::Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        builder.append_path_with_name(entry.path(), rel)?;
    }

    builder.into_inner()?.finish()
}

/// Unpack a tar.gz stream into `dest`.
///
/// Directory entries are created, file entries get their parent directories
/// created as needed and overwrite whatever is at the target path. Entries
/// whose paths would escape `dest` are skipped.
pub fn unpack<R: Read>(reader: R, dest: &Path) -> io::Result<()> {
    extract_with(reader, |entry| {
        let Some(rel) = contained_path(Path::new(&entry.name)) else {
            warn!("skipping archive entry escaping the target dir: {:?}", entry.name);
            return None;
        };
        Some(dest.join(rel))
    })
}

/// Streaming extraction with caller-controlled placement.
///
/// `target_for` receives each entry in stream order and returns where to
/// write it, or `None` to skip it. Symlinks and special entries are never
/// surfaced; they have no place in an asset bundle.
pub fn extract_with<R: Read>(
    reader: R,
    mut target_for: impl FnMut(&ArchiveEntry) -> Option<PathBuf>,
) -> io::Result<()> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let kind = entry.header().entry_type();
        if !kind.is_dir() && !kind.is_file() {
            continue;
        }
        let is_dir = kind.is_dir();
        let mut name = entry.path()?.to_string_lossy().into_owned();
        if is_dir && !name.ends_with('/') {
            name.push('/');
        }
        let Some(target) = target_for(&ArchiveEntry { name, is_dir }) else {
            continue;
        };

        if is_dir {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&target)?;
            io::copy(&mut entry, &mut file)?;
        }
    }
    Ok(())
}

/// Enumerate entry names without extracting anything.
pub fn list_entries<R: Read>(reader: R) -> io::Result<Vec<ArchiveEntry>> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut entries = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        let is_dir = entry.header().entry_type().is_dir();
        let mut name = entry.path()?.to_string_lossy().into_owned();
        if is_dir && !name.ends_with('/') {
            name.push('/');
        }
        entries.push(ArchiveEntry { name, is_dir });
    }
    Ok(entries)
}

/// `Some(relative path)` if the entry stays inside the extraction root,
/// `None` for absolute paths or parent-directory components.
pub fn contained_path(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}
