use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Desired cluster state as read from the cluster file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Target version of the managed binary
    pub version: String,
    pub hosts: Vec<HostSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    pub address: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub connection: ConnectionKind,
    /// Local binary to push instead of downloading on the host
    #[serde(default)]
    pub upload_binary_path: Option<PathBuf>,
    #[serde(default)]
    pub reset: bool,
    #[serde(default)]
    pub private_interface: Option<String>,
    #[serde(default)]
    pub private_address: Option<String>,
    /// Overrides the hostname reported by the host
    #[serde(default)]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    #[default]
    Ssh,
    Local,
}

fn default_user() -> String {
    "root".to_string()
}

fn default_port() -> u16 {
    22
}

impl HostSpec {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            user: default_user(),
            port: default_port(),
            connection: ConnectionKind::default(),
            upload_binary_path: None,
            reset: false,
            private_interface: None,
            private_address: None,
            hostname: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.user == "root"
    }
}

impl ClusterSpec {
    pub fn new(version: impl Into<String>, hosts: Vec<HostSpec>) -> Self {
        Self {
            version: version.into(),
            hosts,
        }
    }
}
