use crate::config::{self, ConfigError};
use crate::configurer::{Configurer, ConfigurerError};
use crate::connection::{CancelSignal, Connection, ConnectionError, ExecOptions, RemoteCommand};
use crate::types::{BinaryVersion, ClusterSpec, HostSpec, Metadata};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// One deployment target.
pub struct Host {
    spec: HostSpec,
    connection: Arc<dyn Connection>,
    configurer: OnceCell<Arc<dyn Configurer>>,
    cancel: CancelSignal,
    pub metadata: Metadata,
}

impl Host {
    pub fn new(spec: HostSpec, connection: Arc<dyn Connection>, cancel: CancelSignal) -> Self {
        let metadata = Metadata::from_spec(&spec);
        Self {
            spec,
            connection,
            configurer: OnceCell::new(),
            cancel,
            metadata,
        }
    }

    pub fn spec(&self) -> &HostSpec {
        &self.spec
    }

    pub fn address(&self) -> &str {
        &self.spec.address
    }

    pub fn configurer(&self) -> Option<&Arc<dyn Configurer>> {
        self.configurer.get()
    }

    /// Bind the capability set. A host is bound at most once.
    pub fn bind_configurer(&self, configurer: Arc<dyn Configurer>) -> Result<(), ConfigurerError> {
        self.configurer
            .set(configurer)
            .map_err(|_| ConfigurerError::AlreadyBound {
                host: self.to_string(),
            })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run a command on the host and return its trimmed output.
    pub async fn exec(
        &self,
        command: &RemoteCommand,
        opts: ExecOptions,
    ) -> Result<String, ConnectionError> {
        self.cancel.check()?;
        debug!("{}: executing `{}`", self, command);
        self.connection.exec(command, opts).await
    }

    pub async fn upload(
        &self,
        local: &Path,
        remote: &str,
        opts: ExecOptions,
    ) -> Result<(), ConnectionError> {
        self.cancel.check()?;
        debug!("{}: uploading {} to {}", self, local.display(), remote);
        self.connection.upload(local, remote, opts).await
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.connection.protocol(), self.spec.address)
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("address", &self.spec.address)
            .field("configurer", &self.configurer.get().map(|c| c.name()))
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Loaded cluster: desired version plus the ordered host list.
#[derive(Debug)]
pub struct Cluster {
    pub version: BinaryVersion,
    pub hosts: Vec<Host>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostReport {
    pub address: String,
    pub configurer: Option<String>,
    pub metadata: Metadata,
}

impl Cluster {
    pub fn new(version: BinaryVersion, hosts: Vec<Host>) -> Self {
        Self { version, hosts }
    }

    /// Validate the spec and construct hosts using `connect` for each one.
    pub fn from_spec<F>(spec: &ClusterSpec, connect: F, cancel: CancelSignal) -> Result<Self, ConfigError>
    where
        F: Fn(&HostSpec) -> Arc<dyn Connection>,
    {
        let version = config::validate(spec)?;
        let hosts = spec
            .hosts
            .iter()
            .map(|h| Host::new(h.clone(), connect(h), cancel.clone()))
            .collect();

        Ok(Self::new(version, hosts))
    }

    /// Indices of hosts matching `predicate`, in host order.
    pub fn filter<P>(&self, predicate: P) -> Vec<usize>
    where
        P: Fn(&Host) -> bool,
    {
        self.hosts
            .iter()
            .enumerate()
            .filter(|(_, h)| predicate(h))
            .map(|(i, _)| i)
            .collect()
    }

    /// Mutable access to the hosts at `indices`.
    pub fn select_mut<'a>(
        &'a mut self,
        indices: &'a [usize],
    ) -> impl Iterator<Item = &'a mut Host> + 'a {
        self.hosts
            .iter_mut()
            .enumerate()
            .filter(move |(i, _)| indices.contains(i))
            .map(|(_, h)| h)
    }

    pub fn report(&self) -> Vec<HostReport> {
        self.hosts
            .iter()
            .map(|h| HostReport {
                address: h.address().to_string(),
                configurer: h.configurer().map(|c| c.name().to_string()),
                metadata: h.metadata.clone(),
            })
            .collect()
    }
}
