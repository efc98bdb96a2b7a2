use crate::config::ConfigError;
use crate::configurer::parent_dir;
use crate::connection::ExecOptions;
use crate::phase::{bound_configurer, Dispatcher, HostStep, Phase, PhaseError};
use crate::types::{BinaryVersion, Cluster, Host, Metadata};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

/// Pushes a locally supplied binary to the hosts that ask for one.
#[derive(Debug, Default)]
pub struct UploadBinaries {
    hosts: Vec<usize>,
}

/// Whether a host with `metadata` needs the local binary pushed to it.
pub fn should_upload(metadata: &Metadata, desired: &BinaryVersion) -> bool {
    metadata.upload_binary_path.is_some()
        && !metadata.reset
        && !metadata.needs_upgrade
        && metadata.binary_version.as_ref() != Some(desired)
}

struct UploadBinary<'a> {
    desired: &'a BinaryVersion,
}

#[async_trait]
impl<'a> HostStep for UploadBinary<'a> {
    fn name(&self) -> &str {
        "upload binary"
    }

    async fn run(&self, host: &mut Host) -> Result<(), PhaseError> {
        let configurer = bound_configurer(host)?;
        let local = host.metadata.upload_binary_path.clone().ok_or_else(|| {
            ConfigError::InvalidReference(format!("{host}: no upload binary path"))
        })?;
        let local_meta = tokio::fs::metadata(&local)
            .await
            .map_err(|source| local_error(&local, source))?;

        let target = configurer.binary_path();
        let sudo = ExecOptions::elevated();

        if configurer.file_changed(host, &local, &target).await {
            let dir = parent_dir(&target);
            if !configurer.file_exist(host, &dir).await {
                configurer.mkdir(host, &dir, sudo).await?;
                configurer.chmod(host, &dir, "0755", sudo).await?;
            }

            info!("{}: uploading binary {} to {}", host, local.display(), target);
            host.upload(&local, &target, sudo).await?;
        } else {
            info!("{}: binary {} is already up to date", host, target);
        }

        configurer.chmod(host, &target, "0700", sudo).await?;

        let modified = local_meta
            .modified()
            .map_err(|source| local_error(&local, source))?;
        configurer
            .touch(host, &target, DateTime::<Utc>::from(modified), sudo)
            .await?;

        let installed = configurer.binary_version(host).await?;
        host.metadata.binary_version = Some(installed.clone());
        installed.ensure_matches(self.desired)?;

        Ok(())
    }
}

fn local_error(path: &Path, source: std::io::Error) -> PhaseError {
    PhaseError::LocalArtifact {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl Phase for UploadBinaries {
    fn title(&self) -> String {
        "Upload binaries to hosts".to_string()
    }

    fn prepare(&mut self, cluster: &Cluster) -> Result<(), PhaseError> {
        if let Some(h) = cluster.hosts.iter().find(|h| {
            h.metadata
                .upload_binary_path
                .as_ref()
                .is_some_and(|p| p.as_os_str().is_empty())
        }) {
            return Err(ConfigError::InvalidReference(format!(
                "{h}: uploadBinaryPath is empty"
            ))
            .into());
        }

        self.hosts = cluster.filter(|h| should_upload(&h.metadata, &cluster.version));
        Ok(())
    }

    fn should_run(&self) -> bool {
        !self.hosts.is_empty()
    }

    async fn run(
        &mut self,
        cluster: &mut Cluster,
        dispatcher: &Dispatcher,
    ) -> Result<(), PhaseError> {
        let desired = cluster.version.clone();
        let step = UploadBinary { desired: &desired };
        dispatcher
            .parallel_do(cluster.select_mut(&self.hosts), &[&step])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn desired() -> BinaryVersion {
        "v1.29.2+k0s.0".parse().unwrap()
    }

    fn uploading() -> Metadata {
        Metadata {
            upload_binary_path: Some(PathBuf::from("/tmp/k0s")),
            ..Metadata::default()
        }
    }

    #[test]
    fn test_should_upload() {
        assert!(should_upload(&uploading(), &desired()));

        assert!(!should_upload(&Metadata::default(), &desired()));

        let reset = Metadata {
            reset: true,
            ..uploading()
        };
        assert!(!should_upload(&reset, &desired()));

        let upgrading = Metadata {
            needs_upgrade: true,
            ..uploading()
        };
        assert!(!should_upload(&upgrading, &desired()));

        let current = Metadata {
            binary_version: Some(desired()),
            ..uploading()
        };
        assert!(!should_upload(&current, &desired()));

        let other_build = Metadata {
            binary_version: Some("v1.29.2+k0s.1".parse().unwrap()),
            ..uploading()
        };
        assert!(should_upload(&other_build, &desired()));
    }
}
