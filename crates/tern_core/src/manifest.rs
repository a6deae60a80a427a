use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One asset folder as reported by the manifest endpoint.
///
/// Identity is the folder name (unique within its zone); `md5` is the
/// content fingerprint of the folder's full file set, so two folders with
/// identical relative paths and bytes report the same value regardless of
/// timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub name: String,
    pub md5: String,
}

/// The manifest is a fresh snapshot, per zone, of the asset folders present
/// under that zone's base directory at enumeration time.
///
/// Wire format: `{ "<zone>": [ {"name": "...", "md5": "..."} ], ... }`
pub type Manifest = BTreeMap<String, Vec<FolderEntry>>;
