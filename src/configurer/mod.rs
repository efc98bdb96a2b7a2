//! Host capability sets.
//!
//! A [`Configurer`] exposes the remote primitives phases build on. There is a
//! single shared implementation, [`Linux`], whose distribution specific paths
//! come from an injected [`PathProvider`]. The configurer for a host is picked
//! once by [`resolve_configurer`] and bound to the host for the rest of the run.

pub mod error;
pub mod linux;
pub mod network;
pub mod os_release;
pub mod paths;

pub use error::ConfigurerError;
pub use linux::{parent_dir, Linux};
pub use network::normalize_arch;
pub use os_release::OsRelease;
pub use paths::{DefaultPaths, FlatcarPaths, PathProvider};

use crate::connection::{ExecOptions, RemoteCommand};
use crate::types::{BinaryVersion, Host};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub type Result<T> = std::result::Result<T, ConfigurerError>;

/// Size and modification time of a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteStat {
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Remote primitives for one operating system family.
#[async_trait]
pub trait Configurer: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn binary_path(&self) -> String;

    fn config_path(&self) -> String;

    fn join_token_path(&self) -> String;

    /// Managed binary invoked with `args`.
    fn binary_command(&self, args: &[&str]) -> RemoteCommand;

    /// Admin kubeconfig when present, the kubelet one otherwise.
    async fn kubeconfig_path(&self, h: &Host) -> String;

    async fn kubectl_command(&self, h: &Host, args: &[&str]) -> RemoteCommand;

    async fn lock_file_path(&self, h: &Host) -> String;

    async fn arch(&self, h: &Host) -> Result<String>;

    async fn hostname(&self, h: &Host) -> Result<String>;

    async fn binary_version(&self, h: &Host) -> Result<BinaryVersion>;

    async fn check_privilege(&self, h: &Host) -> Result<()>;

    async fn temp_file(&self, h: &Host) -> Result<String>;

    async fn temp_dir(&self, h: &Host) -> Result<String>;

    async fn download_url(&self, h: &Host, url: &str, destination: &str, opts: ExecOptions)
        -> Result<()>;

    /// Download `url` and install it at `destination` with `mode`, owned by root.
    async fn install_artifact(&self, h: &Host, url: &str, destination: &str, mode: &str)
        -> Result<()>;

    /// Download the release binary for `version` and `arch` from upstream.
    async fn download_binary(&self, h: &Host, version: &BinaryVersion, arch: &str) -> Result<()>;

    async fn replace_token_path(&self, h: &Host, service_path: &str) -> Result<()>;

    async fn file_exist(&self, h: &Host, path: &str) -> bool;

    async fn file_contains(&self, h: &Host, path: &str, needle: &str) -> bool;

    async fn stat(&self, h: &Host, path: &str) -> Result<Option<RemoteStat>>;

    /// Whether `remote` has to be replaced by the local file `local`.
    async fn file_changed(&self, h: &Host, local: &Path, remote: &str) -> bool;

    async fn mkdir(&self, h: &Host, path: &str, opts: ExecOptions) -> Result<()>;

    async fn chmod(&self, h: &Host, path: &str, mode: &str, opts: ExecOptions) -> Result<()>;

    async fn touch(&self, h: &Host, path: &str, time: DateTime<Utc>, opts: ExecOptions)
        -> Result<()>;

    async fn move_file(&self, h: &Host, src: &str, dst: &str) -> Result<()>;

    async fn delete_file(&self, h: &Host, path: &str) -> Result<()>;

    async fn delete_dir(&self, h: &Host, path: &str, opts: ExecOptions) -> Result<()>;

    /// Create `path` with `content` only if it does not exist yet.
    async fn upsert_file(&self, h: &Host, path: &str, content: &str) -> Result<()>;

    async fn http_status(&self, h: &Host, url: &str) -> Result<u16>;

    async fn private_interface(&self, h: &Host) -> Result<String>;

    async fn private_address(&self, h: &Host, iface: &str, public: &str) -> Result<String>;
}

/// Probe the host's operating system and build its configurer.
pub async fn resolve_configurer(h: &Host) -> Result<Arc<dyn Configurer>> {
    let kernel = h
        .exec(&RemoteCommand::new("uname").arg("-s"), ExecOptions::default())
        .await?;
    if kernel != "Linux" {
        return Err(ConfigurerError::UnsupportedOs(kernel));
    }

    let content = h
        .exec(
            &RemoteCommand::new("cat").arg("/etc/os-release"),
            ExecOptions::default(),
        )
        .await?;
    let release = OsRelease::parse(&content);
    debug!("{}: detected {} ({})", h, release.name, release.id);

    let configurer = if release.is("flatcar") {
        Linux::flatcar()
    } else {
        Linux::default()
    };

    Ok(Arc::new(configurer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{CancelSignal, MockConnection};
    use crate::types::HostSpec;

    fn host(conn: MockConnection) -> Host {
        Host::new(HostSpec::new("10.0.0.1"), Arc::new(conn), CancelSignal::never())
    }

    #[tokio::test]
    async fn test_resolves_flatcar_paths() {
        let h = host(
            MockConnection::new("10.0.0.1")
                .respond("uname -s", "Linux")
                .with_file("/etc/os-release", "ID=flatcar\nNAME=\"Flatcar\"\n"),
        );

        let configurer = resolve_configurer(&h).await.unwrap();
        assert_eq!(configurer.name(), "linux/flatcar");
        assert_eq!(configurer.binary_path(), "/opt/bin/k0s");
    }

    #[tokio::test]
    async fn test_resolves_default_linux() {
        let h = host(
            MockConnection::new("10.0.0.1")
                .respond("uname -s", "Linux")
                .with_file("/etc/os-release", "ID=ubuntu\nID_LIKE=debian\n"),
        );

        let configurer = resolve_configurer(&h).await.unwrap();
        assert_eq!(configurer.name(), "linux");
        assert_eq!(configurer.binary_path(), "/usr/local/bin/k0s");
    }

    #[tokio::test]
    async fn test_rejects_non_linux() {
        let h = host(MockConnection::new("10.0.0.1").respond("uname -s", "Darwin"));
        let err = resolve_configurer(&h).await.unwrap_err();
        assert!(matches!(err, ConfigurerError::UnsupportedOs(os) if os == "Darwin"));
    }
}
