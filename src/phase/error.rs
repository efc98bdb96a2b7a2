use crate::config::ConfigError;
use crate::configurer::ConfigurerError;
use crate::connection::ConnectionError;
use crate::types::VersionMismatch;
use std::fmt::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Configurer(ConfigurerError),

    #[error(transparent)]
    VersionMismatch(#[from] VersionMismatch),

    #[error("failed to read local artifact {path}: {source}")]
    LocalArtifact {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no configurer bound to {host}")]
    NotBound { host: String },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<ConfigurerError> for PhaseError {
    fn from(e: ConfigurerError) -> Self {
        if e.is_cancelled() {
            PhaseError::Cancelled
        } else {
            PhaseError::Configurer(e)
        }
    }
}

impl From<ConnectionError> for PhaseError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::Cancelled => PhaseError::Cancelled,
            other => PhaseError::Configurer(ConfigurerError::Command(other)),
        }
    }
}

/// One failed step on one host.
#[derive(Debug)]
pub struct HostFailure {
    pub host: String,
    pub step: String,
    pub error: PhaseError,
}

/// Every per-host failure of a dispatch, in host order.
#[derive(Debug, Error)]
#[error("{}", describe(.failures))]
pub struct DispatchError {
    pub failures: Vec<HostFailure>,
}

impl DispatchError {
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = self.failures.iter().map(|f| f.host.as_str()).collect();
        hosts.dedup();
        hosts
    }
}

fn describe(failures: &[HostFailure]) -> String {
    let mut out = format!("{} failure(s):", failures.len());
    for failure in failures {
        let _ = write!(out, "\n  {}: {}: {}", failure.host, failure.step, failure.error);
    }
    out
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("prepare {phase}: {source}")]
    Prepare {
        phase: String,
        #[source]
        source: PhaseError,
    },

    #[error("{phase}: {source}")]
    Phase {
        phase: String,
        #[source]
        source: PhaseError,
    },

    #[error("pipeline cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_lists_every_failure() {
        let err = DispatchError {
            failures: vec![
                HostFailure {
                    host: "[ssh] 10.0.0.1".to_string(),
                    step: "unique hostname".to_string(),
                    error: ConfigError::DuplicateHostname {
                        hostname: "node1".to_string(),
                    }
                    .into(),
                },
                HostFailure {
                    host: "[ssh] 10.0.0.2".to_string(),
                    step: "sudo".to_string(),
                    error: PhaseError::Cancelled,
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("2 failure(s):"));
        assert!(message.contains("[ssh] 10.0.0.1: unique hostname: hostname is not unique: node1"));
        assert!(message.contains("[ssh] 10.0.0.2: sudo: operation cancelled"));
        assert_eq!(err.hosts(), vec!["[ssh] 10.0.0.1", "[ssh] 10.0.0.2"]);
    }

    #[test]
    fn test_cancellation_is_not_wrapped() {
        let err: PhaseError = ConfigurerError::Command(ConnectionError::Cancelled).into();
        assert!(matches!(err, PhaseError::Cancelled));

        let err: PhaseError = ConnectionError::Cancelled.into();
        assert!(matches!(err, PhaseError::Cancelled));
    }
}
