use crate::digest::{file_md5, folder_md5_with};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::UNIX_EPOCH;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    md5: String,
    last_modified: u64,
}

/// Memoizes per-file digests keyed by (path, last-modified timestamp).
///
/// An entry is valid only while the file's current mtime equals the stored
/// one; any mismatch forces recomputation. The table is shared by all
/// request handlers (reads and writes are lock-free); persistence to disk is
/// serialized behind one async mutex so concurrent refreshes never
/// interleave writes to the on-disk table.
///
/// Lifecycle: [`load`](Self::load) once at server start,
/// [`persist`](Self::persist) scheduled after refreshes and awaited on
/// server stop.
pub struct DigestCache {
    store_path: PathBuf,
    table: DashMap<PathBuf, CacheEntry>,
    persist_lock: Mutex<()>,
    dirty: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DigestCache {
    pub fn new(store_path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            store_path: store_path.into(),
            table: DashMap::new(),
            persist_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Load the persisted table. A missing or unparsable store is treated
    /// as an empty cache, never as a fatal error.
    pub async fn load(&self) {
        let data = match tokio::fs::read(&self.store_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!("failed to read digest cache {:?}: {e}", self.store_path);
                return;
            }
        };
        match serde_json::from_slice::<BTreeMap<String, CacheEntry>>(&data) {
            Ok(entries) => {
                for (path, entry) in entries {
                    self.table.insert(PathBuf::from(path), entry);
                }
                info!("loaded {} cached file digests", self.table.len());
            }
            Err(e) => {
                warn!(
                    "digest cache {:?} is unreadable, starting empty: {e}",
                    self.store_path
                );
            }
        }
    }

    /// Digest of a single file, served from the cache while the file's
    /// mtime is unchanged. A refresh marks the table dirty; the caller
    /// decides when to schedule a persist.
    pub fn file_md5(&self, path: &Path) -> String {
        let Some(mtime) = mtime_millis(path) else {
            return String::new();
        };

        if let Some(entry) = self.table.get(path) {
            if entry.last_modified == mtime {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return entry.md5.clone();
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let md5 = file_md5(path);
        if !md5.is_empty() {
            self.table.insert(
                path.to_path_buf(),
                CacheEntry {
                    md5: md5.clone(),
                    last_modified: mtime,
                },
            );
            self.dirty.store(true, Ordering::Release);
        }
        md5
    }

    /// Folder fingerprint with per-file digests served from the cache.
    ///
    /// If the scan refreshed any entry, one asynchronous persist of the
    /// table is scheduled afterwards, so a cold-cache bulk scan writes the
    /// store once per folder rather than once per file.
    pub fn folder_md5(self: &Arc<Self>, dir: &Path) -> String {
        let digest = folder_md5_with(dir, |path| self.file_md5(path));
        if self.dirty.load(Ordering::Acquire) {
            self.schedule_persist();
        }
        digest
    }

    fn schedule_persist(self: &Arc<Self>) {
        // Outside a runtime (direct library use) the scheduled write is
        // skipped; the shutdown persist still covers the refreshed entries.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let cache = Arc::clone(self);
        handle.spawn(async move {
            cache.persist().await;
        });
    }

    /// Write the table to disk if it changed since the last persist.
    ///
    /// Awaited on server stop, which guarantees no digest work is lost even
    /// when scheduled persists were still pending.
    pub async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return;
        }

        let snapshot: BTreeMap<String, CacheEntry> = self
            .table
            .iter()
            .map(|entry| {
                (
                    entry.key().to_string_lossy().into_owned(),
                    entry.value().clone(),
                )
            })
            .collect();

        let json = match serde_json::to_vec(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                error!("failed to serialize digest cache: {e}");
                return;
            }
        };
        if let Some(parent) = self.store_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(e) = tokio::fs::write(&self.store_path, json).await {
            error!("failed to persist digest cache {:?}: {e}", self.store_path);
            self.dirty.store(true, Ordering::Release);
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of lookups served from the table without re-reading the file.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that had to (re)compute a digest from disk.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

fn mtime_millis(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    modified
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::folder_md5;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn cached_lookup_skips_recompute() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.bin");
        fs::write(&file, b"payload").unwrap();
        let cache = DigestCache::new(dir.path().join("cache.json"));

        let first = cache.file_md5(&file);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 0);

        let second = cache.file_md5(&file);
        assert_eq!(first, second);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn touched_timestamp_forces_one_recompute() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.bin");
        fs::write(&file, b"payload").unwrap();
        let cache = DigestCache::new(dir.path().join("cache.json"));

        let first = cache.file_md5(&file);
        // same bytes, new mtime
        std::thread::sleep(Duration::from_millis(20));
        fs::write(&file, b"payload").unwrap();

        let second = cache.file_md5(&file);
        assert_eq!(first, second);
        assert_eq!(cache.misses(), 2);

        cache.file_md5(&file);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn cached_folder_digest_matches_uncached() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("hero");
        fs::create_dir_all(folder.join("textures")).unwrap();
        fs::write(folder.join("model.pmx"), b"model").unwrap();
        fs::write(folder.join("textures/skin.png"), b"skin").unwrap();

        let cache = DigestCache::new(dir.path().join("cache.json"));
        assert_eq!(cache.folder_md5(&folder), folder_md5(&folder));
    }

    #[tokio::test]
    async fn persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.bin");
        fs::write(&file, b"payload").unwrap();
        let store = dir.path().join("cache.json");

        let cache = DigestCache::new(&store);
        let digest = cache.file_md5(&file);
        cache.persist().await;
        assert!(store.exists());

        let reloaded = DigestCache::new(&store);
        reloaded.load().await;
        assert_eq!(reloaded.len(), 1);
        // served from the loaded table, no recompute
        assert_eq!(reloaded.file_md5(&file), digest);
        assert_eq!(reloaded.misses(), 0);
    }

    #[tokio::test]
    async fn corrupt_store_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("cache.json");
        fs::write(&store, b"{not json").unwrap();

        let cache = DigestCache::new(&store);
        cache.load().await;
        assert!(cache.is_empty());
    }
}
