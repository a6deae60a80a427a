use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A zone maps one logical asset category to a base directory.
///
/// Every immediate subdirectory of `dir` is one installable asset folder.
/// Zones are fixed at configuration time and immutable during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub dir: PathBuf,
}

impl Zone {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Address pushed to clients. Left empty, clients fall back to the
    /// address of the host they are connected to plus `port`.
    pub server_url: String,

    /// Whether to run the embedded transfer server.
    pub enable_server: bool,

    /// Port the transfer server listens on.
    pub port: u16,

    /// Download bandwidth cap in Mbps, 0 = unlimited. Hook point only, the
    /// transfer server does not currently enforce it.
    pub max_bandwidth_mbps: f64,

    /// Enable gzip on HTTP responses.
    pub enable_gzip: bool,

    pub zones: Vec<Zone>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            enable_server: false,
            port: 5000,
            max_bandwidth_mbps: 0.0,
            enable_gzip: true,
            zones: vec![
                Zone::new("models", "assets/models"),
                Zone::new("animations", "assets/animations"),
            ],
        }
    }
}

impl SyncConfig {
    /// Load the config from a TOML file.
    ///
    /// A missing file is not an error: the default config is written back
    /// to `path` and returned, so a fresh install gets a commented template
    /// to edit.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write the config back out as commented TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = String::new();
        out.push_str("# tern sync configuration\n\n");
        out.push_str("# Address pushed to connected clients. Leave empty to let clients\n");
        out.push_str("# derive it from the host they are connected to plus `port`.\n");
        out.push_str(&format!("server_url = {:?}\n\n", self.server_url));
        out.push_str("# Run the embedded transfer server.\n");
        out.push_str(&format!("enable_server = {}\n\n", self.enable_server));
        out.push_str("# Transfer server port.\n");
        out.push_str(&format!("port = {}\n\n", self.port));
        out.push_str("# Download bandwidth cap in Mbps, 0 = unlimited.\n");
        out.push_str(&format!(
            "max_bandwidth_mbps = {:.1}\n\n",
            self.max_bandwidth_mbps
        ));
        out.push_str("# Gzip HTTP responses.\n");
        out.push_str(&format!("enable_gzip = {}\n", self.enable_gzip));
        for zone in &self.zones {
            out.push_str("\n[[zones]]\n");
            out.push_str(&format!("name = {:?}\n", zone.name));
            out.push_str(&format!("dir = {:?}\n", zone.dir.display().to_string()));
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.name == name)
    }

    /// The address the host broadcasts to clients after startup or
    /// reconfiguration: the configured `server_url`, or `":port"` when
    /// empty so clients combine it with the host address they already know.
    pub fn advertised_address(&self) -> String {
        let url = self.server_url.trim();
        if url.is_empty() {
            format!(":{}", self.port)
        } else {
            url.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_with_zones() {
        let toml = r#"
enable_server = true
port = 5200

[[zones]]
name = "models"
dir = "data/models"

[[zones]]
name = "animations"
dir = "data/animations"
"#;
        let config: SyncConfig = toml::from_str(toml).unwrap();
        assert!(config.enable_server);
        assert_eq!(config.port, 5200);
        assert_eq!(config.zones.len(), 2);
        assert_eq!(config.zone("models").unwrap().dir, PathBuf::from("data/models"));
        assert!(config.zone("textures").is_none());
        // unset keys keep their defaults
        assert!(config.enable_gzip);
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tern.toml");

        let mut config = SyncConfig::default();
        config.enable_server = true;
        config.server_url = "sync.example.net:5000".to_string();
        config.save(&path).unwrap();

        let reloaded = SyncConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn load_missing_file_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tern.toml");

        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn advertised_address_falls_back_to_port() {
        let mut config = SyncConfig::default();
        assert_eq!(config.advertised_address(), ":5000");
        config.server_url = "http://10.0.0.2:5000".to_string();
        assert_eq!(config.advertised_address(), "http://10.0.0.2:5000");
    }
}
