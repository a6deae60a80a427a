use std::sync::Arc;
use tern_core::config::Zone;
use tern_digest::DigestCache;

#[derive(Clone)]
pub struct AppState {
    pub zones: Arc<Vec<Zone>>,
    pub cache: Arc<DigestCache>,
}

impl AppState {
    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.name == name)
    }
}
