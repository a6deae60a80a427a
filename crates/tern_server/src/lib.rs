use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tern_core::config::{SyncConfig, Zone};
use tern_digest::DigestCache;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

mod api;
mod ingest;

pub mod state;

use state::AppState;

pub mod prelude {
    pub use crate::state::*;
    pub use crate::{ServerHandle, TernServer, TernServerConfig};
}

/// The builder for the tern transfer server.
#[derive(Clone, Debug, Default)]
pub struct TernServer {
    config: TernServerConfig,
}

impl TernServer {
    pub fn new(config: TernServerConfig) -> Self {
        Self { config }
    }
}

#[derive(Clone, Debug)]
pub struct TernServerConfig {
    /// Port the server listens on.
    pub port: u16,
    /// Zones served by this host; each zone maps to one base directory.
    pub zones: Vec<Zone>,
    /// Gzip HTTP responses.
    pub enable_gzip: bool,
}

impl Default for TernServerConfig {
    fn default() -> Self {
        (&SyncConfig::default()).into()
    }
}

impl From<&SyncConfig> for TernServerConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            port: config.port,
            zones: config.zones.clone(),
            enable_gzip: config.enable_gzip,
        }
    }
}

impl TernServer {
    pub fn build(self, cache: Arc<DigestCache>) -> Router {
        let enable_gzip = self.config.enable_gzip;
        let state = AppState {
            zones: Arc::new(self.config.zones),
            cache,
        };

        let router = Router::new()
            .route("/", get(api::index))
            .route("/api/sync", get(api::manifest))
            .route("/download/{zone}/{folder}", get(api::download))
            .route("/upload", post(api::upload))
            .layer(DefaultBodyLimit::disable())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        if enable_gzip {
            router.layer(CompressionLayer::new())
        } else {
            router
        }
    }

    /// Start the server in the background and return immediately.
    ///
    /// Cache loading and socket binding happen on the runtime, not on the
    /// caller, so a latency-sensitive caller (a game main loop triggering
    /// startup) never waits on a slow disk scan.
    pub fn start(self, cache: Arc<DigestCache>) -> ServerHandle {
        let port = self.config.port;
        let app = self.build(Arc::clone(&cache));
        let (ready_tx, ready_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let load_cache = Arc::clone(&cache);
        let task = tokio::spawn(async move {
            load_cache.load().await;

            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("failed to bind transfer server on {addr}: {e}");
                    return;
                }
            };
            let local_addr = listener.local_addr().ok();
            if let Some(local_addr) = local_addr {
                info!("transfer server listening on {local_addr}");
            }
            let _ = ready_tx.send(local_addr);

            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                error!("transfer server error: {e}");
            }
        });

        ServerHandle {
            shutdown: Some(shutdown_tx),
            task,
            ready: ready_rx,
            cache,
        }
    }
}

/// Handle to a running transfer server.
pub struct ServerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    ready: watch::Receiver<Option<SocketAddr>>,
    cache: Arc<DigestCache>,
}

impl ServerHandle {
    /// Wait until the listener is bound. `None` means startup failed.
    pub async fn bound_addr(&mut self) -> Option<SocketAddr> {
        loop {
            if let Some(addr) = *self.ready.borrow() {
                return Some(addr);
            }
            if self.ready.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Stop accepting connections, drain in-flight requests, then flush the
    /// digest cache to disk. Returns once the flush has completed, so no
    /// digest work is lost across a restart.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = self.task.await {
            error!("transfer server task failed: {e}");
        }
        self.cache.persist().await;
    }
}
