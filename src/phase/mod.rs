//! Phase pipeline.
//!
//! A [`Phase`] selects the hosts it applies to in `prepare`, and the
//! [`Manager`] runs phases in order, stopping at the first one that fails.
//! Phases fan work out to their hosts through a [`Dispatcher`].

pub mod detect_os;
pub mod dispatcher;
pub mod error;
pub mod gather_facts;
pub mod manager;
pub mod upload_binaries;
pub mod validate_hosts;

pub use detect_os::DetectOs;
pub use dispatcher::{Dispatcher, HostStep};
pub use error::{DispatchError, HostFailure, PhaseError, PipelineError};
pub use gather_facts::GatherFacts;
pub use manager::{default_phases, Manager, ManagerConfig};
pub use upload_binaries::{should_upload, UploadBinaries};
pub use validate_hosts::ValidateHosts;

use crate::configurer::Configurer;
use crate::types::{Cluster, Host};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Phase: Send {
    fn title(&self) -> String;

    /// Select the hosts this phase applies to. Must not touch the hosts.
    fn prepare(&mut self, _cluster: &Cluster) -> Result<(), PhaseError> {
        Ok(())
    }

    fn should_run(&self) -> bool {
        true
    }

    async fn run(&mut self, cluster: &mut Cluster, dispatcher: &Dispatcher)
        -> Result<(), PhaseError>;
}

/// The configurer bound to `host`, detached from the host borrow.
pub fn bound_configurer(host: &Host) -> Result<Arc<dyn Configurer>, PhaseError> {
    host.configurer()
        .cloned()
        .ok_or_else(|| PhaseError::NotBound {
            host: host.to_string(),
        })
}
