use crate::phase::{bound_configurer, Dispatcher, HostStep, Phase, PhaseError};
use crate::types::{BinaryVersion, Cluster, Host};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Collects hostname, architecture, installed version and private address.
#[derive(Debug, Default)]
pub struct GatherFacts {
    hosts: Vec<usize>,
}

struct CollectFacts<'a> {
    desired: &'a BinaryVersion,
}

#[async_trait]
impl<'a> HostStep for CollectFacts<'a> {
    fn name(&self) -> &str {
        "gather facts"
    }

    async fn run(&self, host: &mut Host) -> Result<(), PhaseError> {
        let configurer = bound_configurer(host)?;

        if host.metadata.hostname.is_empty() {
            let hostname = configurer.hostname(host).await?;
            host.metadata.hostname = hostname;
        }

        let arch = configurer.arch(host).await?;
        host.metadata.arch = arch;

        if configurer.file_exist(host, &configurer.binary_path()).await {
            let installed = configurer.binary_version(host).await?;
            host.metadata.needs_upgrade = !host.metadata.reset && installed < *self.desired;
            info!("{}: has binary version {}", host, installed);
            host.metadata.binary_version = Some(installed);
        } else {
            debug!("{}: binary not installed", host);
            host.metadata.binary_version = None;
            host.metadata.needs_upgrade = false;
        }

        if host.metadata.private_interface.is_none() {
            match configurer.private_interface(host).await {
                Ok(iface) => {
                    debug!("{}: discovered private interface {}", host, iface);
                    host.metadata.private_interface = Some(iface);
                }
                Err(e) if e.is_cancelled() => return Err(PhaseError::Cancelled),
                Err(e) => warn!("{}: {}", host, e),
            }
        }

        if host.metadata.private_address.is_none() {
            if let Some(iface) = host.metadata.private_interface.clone() {
                match configurer
                    .private_address(host, &iface, host.address())
                    .await
                {
                    Ok(addr) => {
                        info!("{}: discovered {} as private address", host, addr);
                        host.metadata.private_address = Some(addr);
                    }
                    Err(e) if e.is_cancelled() => return Err(PhaseError::Cancelled),
                    Err(e) => warn!("{}: {}", host, e),
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Phase for GatherFacts {
    fn title(&self) -> String {
        "Gather host facts".to_string()
    }

    fn prepare(&mut self, cluster: &Cluster) -> Result<(), PhaseError> {
        self.hosts = cluster.filter(|_| true);
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
        let step = CollectFacts { desired: &desired };
        dispatcher
            .parallel_do(cluster.select_mut(&self.hosts), &[&step])
            .await?;
        Ok(())
    }
}
