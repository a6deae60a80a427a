//! Upload ingestion.
//!
//! Incoming archives have whatever internal layout the uploader's tool
//! produced: a single bare file, one wrapped folder, several top-level
//! folders, or a deeply nested single chain. The consumer of these assets
//! only recognizes one level of subfolder under a zone, so every upload is
//! normalized into exactly one asset folder: strip the longest shared
//! leading directory chain, wrap the remainder when it is not a single
//! folder, and give the destination a dated, collision-free name.

use chrono::Local;
use rand::Rng;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use tern_core::error::StoreError;

/// Normalize one upload payload into an asset folder under `base_dir`.
///
/// `original_name` is the uploader-supplied file name; a `.tar.gz`/`.tgz`
/// suffix selects archive ingestion, a relative path selects the
/// directory-upload rule, anything else is a bare file.
pub fn ingest(base_dir: &Path, original_name: &str, body: &[u8]) -> Result<(), StoreError> {
    std::fs::create_dir_all(base_dir)?;
    let date_prefix = Local::now().format("%Y-%m-%d").to_string();

    if is_archive_name(original_name) {
        ingest_archive(base_dir, original_name, body, &date_prefix)
    } else {
        ingest_plain(base_dir, original_name, body, &date_prefix)
    }
}

fn is_archive_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".tar.gz") || lower.ends_with(".tgz")
}

fn archive_stem(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".tar.gz") {
        &name[..name.len() - ".tar.gz".len()]
    } else if lower.ends_with(".tgz") {
        &name[..name.len() - ".tgz".len()]
    } else {
        name
    }
}

fn ingest_archive(
    base_dir: &Path,
    original_name: &str,
    body: &[u8],
    date_prefix: &str,
) -> Result<(), StoreError> {
    let entries = tern_archive::list_entries(Cursor::new(body))
        .map_err(|e| StoreError::MalformedUpload(e.to_string()))?;
    let names: Vec<String> = entries.into_iter().map(|e| e.name).collect();

    let prefix = common_prefix(&names);

    // Wrap when several items remain at the top level after stripping, or
    // when the single remaining item has no matching directory entry (it is
    // a bare file).
    let needs_wrap = match remaining_layout(&names, &prefix) {
        Layout::Empty => false,
        Layout::Multiple => true,
        Layout::Single(item) => !names.iter().any(|n| *n == format!("{prefix}{item}/")),
    };
    let wrap_base = archive_stem(original_name);

    let mut renames: HashMap<String, String> = HashMap::new();
    tern_archive::extract_with(Cursor::new(body), |entry| {
        let relative = entry.name.strip_prefix(&prefix)?;
        if relative.is_empty() {
            return None;
        }

        let final_rel = if needs_wrap {
            let top = renames
                .entry(String::new())
                .or_insert_with(|| free_folder_name(base_dir, date_prefix, wrap_base));
            format!("{top}/{relative}")
        } else {
            let (top, rest) = match relative.find('/') {
                Some(idx) => relative.split_at(idx),
                None => (relative, ""),
            };
            let renamed = renames
                .entry(top.to_string())
                .or_insert_with(|| free_folder_name(base_dir, date_prefix, top));
            format!("{renamed}{rest}")
        };

        let rel = tern_archive::contained_path(Path::new(&final_rel))?;
        Some(base_dir.join(rel))
    })
    .map_err(StoreError::Io)?;

    Ok(())
}

fn ingest_plain(
    base_dir: &Path,
    original_name: &str,
    body: &[u8],
    date_prefix: &str,
) -> Result<(), StoreError> {
    let normalized = original_name.replace('\\', "/");

    let target = if let Some(idx) = normalized.find('/') {
        // Directory upload: the first path segment is the asset folder.
        // No collision suffix here, successive files of one directory
        // upload must all land in the same dated folder.
        let (top, remaining) = (&normalized[..idx], &normalized[idx + 1..]);
        if top.is_empty() || remaining.is_empty() {
            return Err(StoreError::MalformedUpload(format!(
                "unusable relative path: {original_name:?}"
            )));
        }
        let rel = tern_archive::contained_path(Path::new(remaining)).ok_or_else(|| {
            StoreError::MalformedUpload(format!("unusable relative path: {original_name:?}"))
        })?;
        base_dir.join(format!("{date_prefix}_{top}")).join(rel)
    } else {
        // A bare file must be wrapped in a folder to be recognized at all;
        // derive the folder from the file name with its extension removed.
        let stem = normalized
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .filter(|stem| !stem.is_empty())
            .unwrap_or(normalized.as_str());
        let folder = free_folder_name(base_dir, date_prefix, stem);
        base_dir.join(folder).join(&normalized)
    };

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, body)?;
    Ok(())
}

/// The longest leading directory chain shared by every entry.
///
/// Extends the prefix one directory at a time while all entries below the
/// current prefix agree on a single top-level directory and none of them is
/// a bare file at that level.
fn common_prefix(names: &[String]) -> String {
    let mut prefix = String::new();
    loop {
        let mut first_top_dir: Option<&str> = None;
        let mut all_match = true;
        let mut file_at_level = false;

        for name in names {
            let Some(relative) = name.strip_prefix(&prefix) else {
                continue;
            };
            if relative.is_empty() {
                continue;
            }
            match relative.find('/') {
                None => file_at_level = true,
                Some(idx) => {
                    let top = &relative[..=idx];
                    match first_top_dir {
                        None => first_top_dir = Some(top),
                        Some(first) if first != top => all_match = false,
                        _ => {}
                    }
                }
            }
        }

        match first_top_dir {
            Some(top) if all_match && !file_at_level => {
                let top = top.to_string();
                prefix.push_str(&top);
            }
            _ => break,
        }
    }
    prefix
}

enum Layout {
    Empty,
    Single(String),
    Multiple,
}

/// What remains at the top level once `prefix` is stripped.
fn remaining_layout(names: &[String], prefix: &str) -> Layout {
    let mut first_item: Option<&str> = None;
    for name in names {
        let Some(relative) = name.strip_prefix(prefix) else {
            continue;
        };
        if relative.is_empty() {
            continue;
        }
        let item = match relative.find('/') {
            Some(idx) => &relative[..idx],
            None => relative,
        };
        match first_item {
            None => first_item = Some(item),
            Some(first) if first != item => return Layout::Multiple,
            _ => {}
        }
    }
    match first_item {
        Some(item) => Layout::Single(item.to_string()),
        None => Layout::Empty,
    }
}

/// A dated destination name not yet present under `base_dir`: the date
/// prefix is always applied, a short random suffix only on collision.
fn free_folder_name(base_dir: &Path, date_prefix: &str, stem: &str) -> String {
    let mut name = format!("{date_prefix}_{stem}");
    while base_dir.join(&name).exists() {
        let suffix: u32 = rand::rng().random_range(0..0x10000);
        name = format!("{date_prefix}_{stem}_{suffix:04x}");
    }
    name
}
