//! End-to-end pull and upload flows against a real bound server.

use std::fs;
use std::sync::{Arc, Mutex};
use tern::client::SyncError;
use tern::prelude::*;

#[derive(Default)]
struct RecordingNotifier(Mutex<Vec<(String, bool)>>);

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, is_error: bool) {
        self.0.lock().unwrap().push((message.to_string(), is_error));
    }
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<(String, bool)> {
        self.0.lock().unwrap().clone()
    }
}

async fn start_server(zones: Vec<Zone>, cache_store: std::path::PathBuf) -> (ServerHandle, String) {
    let config = TernServerConfig {
        port: 0,
        zones,
        enable_gzip: true,
    };
    let cache = DigestCache::new(cache_store);
    let mut handle = TernServer::new(config).start(cache);
    let addr = handle.bound_addr().await.expect("server should bind");
    (handle, format!("http://{addr}"))
}

#[tokio::test]
async fn pull_round_trip_then_up_to_date() {
    let server_root = tempfile::tempdir().unwrap();
    let client_root = tempfile::tempdir().unwrap();

    let hero = server_root.path().join("models/hero");
    fs::create_dir_all(hero.join("textures")).unwrap();
    fs::write(hero.join("model.pmx"), b"model bytes").unwrap();
    fs::write(hero.join("textures/skin.png"), b"skin bytes").unwrap();

    let cache_store = server_root.path().join("tern_cache.json");
    let (handle, url) = start_server(
        vec![Zone::new("models", server_root.path().join("models"))],
        cache_store.clone(),
    )
    .await;

    let mut client_config = SyncConfig::default();
    client_config.zones = vec![Zone::new("models", client_root.path().join("models"))];

    let notifier = Arc::new(RecordingNotifier::default());
    let sync = SyncClient::new(&client_config, Arc::new(NoHost), notifier.clone());
    sync.set_address_override(Some(url));

    // first pass: no local copy, the folder is downloaded and extracted
    sync.run_sync().await;
    let local_hero = client_root.path().join("models/hero");
    assert_eq!(fs::read(local_hero.join("model.pmx")).unwrap(), b"model bytes");
    assert_eq!(
        fs::read(local_hero.join("textures/skin.png")).unwrap(),
        b"skin bytes"
    );
    let messages = notifier.messages();
    assert!(
        messages
            .iter()
            .any(|(m, is_error)| m.contains("1 bundle") && !is_error),
        "expected a completion message, got {messages:?}"
    );

    // second pass: fingerprints match, nothing is downloaded
    sync.run_sync().await;
    let messages = notifier.messages();
    assert!(
        messages.last().unwrap().0.contains("up to date"),
        "expected up-to-date message, got {messages:?}"
    );

    // stop flushes the digest cache to disk
    handle.stop().await;
    assert!(cache_store.exists());
}

#[tokio::test]
async fn upload_shows_up_in_manifest() {
    let server_root = tempfile::tempdir().unwrap();
    let (handle, url) = start_server(
        vec![Zone::new("models", server_root.path().join("models"))],
        server_root.path().join("tern_cache.json"),
    )
    .await;

    // stage an archive with one wrapped folder
    let staged = tempfile::tempdir().unwrap();
    fs::create_dir_all(staged.path().join("dancer")).unwrap();
    fs::write(staged.path().join("dancer/motion.vmd"), b"motion").unwrap();
    let payload = tern::archive::pack(staged.path()).unwrap();

    let client = TernClient::new(url);
    let reply = client
        .upload("models", "dancer.tar.gz", payload)
        .await
        .unwrap();
    assert_eq!(reply, "Upload successful");

    let manifest = client.fetch_manifest().await.unwrap();
    let folders = &manifest["models"];
    assert_eq!(folders.len(), 1);
    assert!(
        folders[0].name.ends_with("_dancer"),
        "expected a dated dancer folder, got {:?}",
        folders[0].name
    );
    assert!(!folders[0].md5.is_empty());

    // the ingested folder round-trips through download
    let archive = client
        .download_folder("models", &folders[0].name)
        .await
        .unwrap();
    let extracted = tempfile::tempdir().unwrap();
    tern::archive::unpack(std::io::Cursor::new(archive), extracted.path()).unwrap();
    assert_eq!(
        fs::read(extracted.path().join("motion.vmd")).unwrap(),
        b"motion"
    );

    // a folder the server does not have is a 404, reported once
    let err = client.download_folder("models", "missing").await.unwrap_err();
    assert!(matches!(err, SyncError::Server(code, _) if code.as_u16() == 404));

    handle.stop().await;
}
