use crate::config::ConfigError;
use crate::phase::{bound_configurer, Dispatcher, HostStep, Phase, PhaseError};
use crate::types::{Cluster, Host};
use async_trait::async_trait;
use std::collections::HashMap;

/// Pre-flight checks that must pass before anything is changed on the hosts.
#[derive(Debug, Default)]
pub struct ValidateHosts {
    hosts: Vec<usize>,
}

struct UniqueHostname<'a> {
    counts: &'a HashMap<String, usize>,
}

#[async_trait]
impl<'a> HostStep for UniqueHostname<'a> {
    fn name(&self) -> &str {
        "unique hostname"
    }

    async fn run(&self, host: &mut Host) -> Result<(), PhaseError> {
        let hostname = &host.metadata.hostname;
        if self.counts.get(hostname).copied().unwrap_or(0) > 1 {
            return Err(ConfigError::DuplicateHostname {
                hostname: hostname.clone(),
            }
            .into());
        }
        Ok(())
    }
}

struct Privilege;

#[async_trait]
impl HostStep for Privilege {
    fn name(&self) -> &str {
        "sudo"
    }

    async fn run(&self, host: &mut Host) -> Result<(), PhaseError> {
        let configurer = bound_configurer(host)?;
        configurer.check_privilege(host).await?;
        Ok(())
    }
}

/// Number of hosts reporting each hostname. Unknown hostnames are not counted.
pub fn hostname_counts<'a>(
    hostnames: impl IntoIterator<Item = &'a str>,
) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for hostname in hostnames.into_iter().filter(|h| !h.is_empty()) {
        *counts.entry(hostname.to_string()).or_insert(0) += 1;
    }
    counts
}

#[async_trait]
impl Phase for ValidateHosts {
    fn title(&self) -> String {
        "Validate hosts".to_string()
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
        let counts = hostname_counts(cluster.hosts.iter().map(|h| h.metadata.hostname.as_str()));

        let unique = UniqueHostname { counts: &counts };
        // checks are independent, each one runs on every host
        dispatcher
            .parallel_check(cluster.select_mut(&self.hosts), &[&unique, &Privilege])
            .await?;
        Ok(())
    }
}
