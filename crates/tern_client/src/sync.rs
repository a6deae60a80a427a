use crate::{Result, SyncError, TernClient, resolve_server_url};
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tern_core::prelude::*;
use tracing::{error, info, warn};

/// A [`Notifier`] that writes status lines to the log, for headless use.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, is_error: bool) {
        if is_error {
            error!("{message}");
        } else {
            info!("{message}");
        }
    }
}

/// Client-side pull orchestrator.
///
/// One instance lives for the whole session; each triggered pass resolves
/// the server address, fetches the manifest and downloads only the folders
/// whose fingerprints differ from the local copies. The sync is pull-only
/// and additive: folders present locally but absent from the manifest are
/// left untouched.
pub struct SyncClient {
    zones: Vec<Zone>,
    default_port: u16,
    address_override: Mutex<Option<String>>,
    host: Arc<dyn HostLink>,
    notifier: Arc<dyn Notifier>,
}

impl SyncClient {
    pub fn new(
        config: &SyncConfig,
        host: Arc<dyn HostLink>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            zones: config.zones.clone(),
            default_port: config.port,
            address_override: Mutex::new(None),
            host,
            notifier,
        })
    }

    /// Address pushed by the server for the current session. Takes
    /// precedence over host-derived resolution until cleared.
    pub fn set_address_override(&self, url: Option<String>) {
        if let Some(url) = url.as_deref().filter(|u| !u.is_empty()) {
            info!("received pushed sync address: {url}");
        }
        *self.address_override.lock().unwrap() = url;
    }

    /// Called when the host connection goes away.
    pub fn clear_address_override(&self) {
        self.set_address_override(None);
    }

    /// The address a sync pass would use right now. Also handed to the
    /// host UI for opening the browser upload page.
    pub fn server_url(&self) -> Option<String> {
        let override_url = self.address_override.lock().unwrap().clone();
        resolve_server_url(
            override_url.as_deref(),
            self.host.connected_address().as_deref(),
            self.default_port,
        )
    }

    /// Trigger one pull pass off the caller's execution context.
    ///
    /// Passes are not serialized against each other; callers should
    /// debounce their triggers.
    pub fn start_sync(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move { client.run_sync().await })
    }

    /// One full pull pass. Failures are reported to the notifier and end
    /// the pass; there is no automatic retry.
    pub async fn run_sync(&self) {
        let Some(base_url) = self.server_url() else {
            // not connected yet is a normal state, not an error
            warn!("no sync address pushed and no host connection, skipping sync");
            return;
        };

        self.notifier
            .notify("Syncing asset bundles from server...", false);

        match self.pull(&TernClient::new(base_url)).await {
            Ok(0) => self
                .notifier
                .notify("Asset bundles already up to date.", false),
            Ok(updated) => self.notifier.notify(
                &format!("Sync complete, {updated} bundle(s) updated."),
                false,
            ),
            Err(e) => {
                error!("sync failed: {e}");
                self.notifier.notify(&format!("Sync failed: {e}"), true);
            }
        }
    }

    async fn pull(&self, client: &TernClient) -> Result<usize> {
        let manifest = client.fetch_manifest().await?;
        let mut updated = 0;
        for zone in &self.zones {
            let Some(folders) = manifest.get(&zone.name) else {
                continue;
            };
            updated += self.sync_zone(client, zone, folders).await;
        }
        Ok(updated)
    }

    /// Folder failures are logged and skipped so one broken bundle never
    /// blocks the rest of the zone.
    async fn sync_zone(
        &self,
        client: &TernClient,
        zone: &Zone,
        folders: &[FolderEntry],
    ) -> usize {
        let mut updated = 0;
        for entry in folders {
            let local_dir = zone.dir.join(&entry.name);
            if !needs_download(&local_dir, entry) {
                continue;
            }
            match self.fetch_folder(client, zone, entry, &local_dir).await {
                Ok(()) => updated += 1,
                Err(e) => error!("failed to sync {}/{}: {e}", zone.name, entry.name),
            }
        }
        updated
    }

    async fn fetch_folder(
        &self,
        client: &TernClient,
        zone: &Zone,
        entry: &FolderEntry,
        local_dir: &Path,
    ) -> Result<()> {
        let archive = client.download_folder(&zone.name, &entry.name).await?;
        let dir = local_dir.to_path_buf();
        tokio::task::spawn_blocking(move || tern_archive::unpack(Cursor::new(archive), &dir))
            .await
            .map_err(|e| SyncError::Io(std::io::Error::other(e)))??;
        Ok(())
    }
}

/// A folder needs downloading when it is absent locally or its locally
/// computed fingerprint differs from the server's. An empty fingerprint on
/// either side always refreshes.
pub fn needs_download(local_dir: &Path, entry: &FolderEntry) -> bool {
    if !local_dir.exists() {
        return true;
    }
    let local = tern_digest::folder_md5(local_dir);
    if local.is_empty() || entry.md5.is_empty() {
        return true;
    }
    !local.eq_ignore_ascii_case(&entry.md5)
}
