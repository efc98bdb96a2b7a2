use crate::connection::ConnectionError;
use crate::types::InvalidVersion;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurerError {
    #[error(transparent)]
    Command(#[from] ConnectionError),

    #[error("invalid {operation} output {output:?}: {reason}")]
    InvalidOutput {
        operation: &'static str,
        output: String,
        reason: String,
    },

    #[error(transparent)]
    InvalidVersion(#[from] InvalidVersion),

    #[error("failed to detect a private network interface, define the host privateInterface manually ({reason})")]
    PrivateInterfaceNotFound { reason: String },

    #[error("failed to find private interface with name {iface}: {reason}. Make sure you've set correct 'privateInterface' for the host in config")]
    PrivateInterfaceLookup { iface: String, reason: String },

    #[error("private address not found on interface {iface}")]
    PrivateAddressNotFound { iface: String },

    #[error("elevated command execution is not available: {reason}")]
    PrivilegeUnavailable { reason: String },

    #[error("upsert of {path} failed: {reason}")]
    UpsertFailed { path: String, reason: String },

    #[error("upsert of {path} failed: the file was created by another writer")]
    UpsertConflict { path: String },

    #[error("unsupported operating system: {0}")]
    UnsupportedOs(String),

    #[error("a configurer is already bound to {host}")]
    AlreadyBound { host: String },
}

impl ConfigurerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConfigurerError::Command(ConnectionError::Cancelled))
    }
}
