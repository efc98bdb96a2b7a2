use crate::types::{BinaryVersion, HostSpec};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Observed state of a host, accumulated phase by phase.
///
/// Only the task acting on the owning host writes to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub hostname: String,
    pub arch: String,
    pub binary_version: Option<BinaryVersion>,
    pub needs_upgrade: bool,
    pub reset: bool,
    pub upload_binary_path: Option<PathBuf>,
    pub private_interface: Option<String>,
    pub private_address: Option<String>,
}

impl Metadata {
    /// Seed metadata with what the cluster file already says about the host.
    pub fn from_spec(spec: &HostSpec) -> Self {
        Self {
            hostname: spec.hostname.clone().unwrap_or_default(),
            reset: spec.reset,
            upload_binary_path: spec.upload_binary_path.clone(),
            private_interface: spec.private_interface.clone(),
            private_address: spec.private_address.clone(),
            ..Self::default()
        }
    }
}
