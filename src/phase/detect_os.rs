use crate::configurer::resolve_configurer;
use crate::phase::{Dispatcher, HostStep, Phase, PhaseError};
use crate::types::{Cluster, Host};
use async_trait::async_trait;
use tracing::info;

/// Binds a configurer to every host that does not have one yet.
#[derive(Debug, Default)]
pub struct DetectOs {
    hosts: Vec<usize>,
}

struct BindConfigurer;

#[async_trait]
impl HostStep for BindConfigurer {
    fn name(&self) -> &str {
        "detect os"
    }

    async fn run(&self, host: &mut Host) -> Result<(), PhaseError> {
        let configurer = resolve_configurer(host).await?;
        info!("{}: is running {}", host, configurer.name());
        host.bind_configurer(configurer)?;
        Ok(())
    }
}

#[async_trait]
impl Phase for DetectOs {
    fn title(&self) -> String {
        "Detect host operating systems".to_string()
    }

    fn prepare(&mut self, cluster: &Cluster) -> Result<(), PhaseError> {
        self.hosts = cluster.filter(|h| h.configurer().is_none());
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
        dispatcher
            .parallel_do(cluster.select_mut(&self.hosts), &[&BindConfigurer])
            .await?;
        Ok(())
    }
}
