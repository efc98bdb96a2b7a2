use crate::types::InvalidVersion;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read cluster file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML cluster file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON cluster file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cluster has no hosts")]
    NoHosts,

    #[error("host {address} is defined more than once")]
    DuplicateAddress { address: String },

    #[error("hostname is not unique: {hostname}")]
    DuplicateHostname { hostname: String },

    #[error(transparent)]
    InvalidVersion(#[from] InvalidVersion),

    #[error("invalid reference: {0}")]
    InvalidReference(String),
}
