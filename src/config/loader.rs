use crate::config::ConfigError;
use crate::types::{BinaryVersion, ClusterSpec};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// JSON for `.json` files, YAML for everything else.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

/// Read a cluster file from disk.
///
/// Relative `uploadBinaryPath` entries are resolved against the directory
/// holding the cluster file.
pub async fn load_cluster_spec(path: &Path) -> Result<ClusterSpec, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

    let mut spec = parse_cluster_spec(&content, Format::from_path(path))?;

    if let Some(base) = path.parent() {
        for host in &mut spec.hosts {
            if let Some(upload) = host.upload_binary_path.as_mut() {
                if upload.is_relative() {
                    *upload = base.join(&*upload);
                }
            }
        }
    }

    debug!("loaded {} hosts from {}", spec.hosts.len(), path.display());
    Ok(spec)
}

pub fn parse_cluster_spec(content: &str, format: Format) -> Result<ClusterSpec, ConfigError> {
    let spec = match format {
        Format::Yaml => serde_yaml::from_str(content)?,
        Format::Json => serde_json::from_str(content)?,
    };
    Ok(spec)
}

/// Structural checks that need no host access. Returns the desired version.
///
/// Hostname uniqueness is not checked here since hostnames are usually only
/// known after the hosts have been contacted.
pub fn validate(spec: &ClusterSpec) -> Result<BinaryVersion, ConfigError> {
    if spec.hosts.is_empty() {
        return Err(ConfigError::NoHosts);
    }

    let version: BinaryVersion = spec.version.parse()?;

    let mut seen = HashSet::new();
    for host in &spec.hosts {
        if host.address.trim().is_empty() {
            return Err(ConfigError::InvalidReference(
                "host address must not be empty".to_string(),
            ));
        }
        let key = format!("{}:{}", host.address, host.port);
        if !seen.insert(key) {
            return Err(ConfigError::DuplicateAddress {
                address: host.address.clone(),
            });
        }
    }

    Ok(version)
}
