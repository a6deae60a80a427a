use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Folder not found: {0}")]
    NotFound(String),

    #[error("Unknown zone: {0}")]
    UnknownZone(String),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
