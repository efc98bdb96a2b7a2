//! Remote execution collaborators.
//!
//! Configurers never talk to a transport directly; they build a
//! [`RemoteCommand`] and hand it to the host's [`Connection`].

pub mod cancel;
pub mod command;
pub mod error;
pub mod local;
pub mod mock;
pub mod ssh;

pub use cancel::{CancelSignal, Canceller};
pub use command::RemoteCommand;
pub use error::ConnectionError;
pub use local::LocalConnection;
pub use mock::{ExecRecord, MockConnection, MockFile};
pub use ssh::SshConnection;

use crate::types::{ConnectionKind, HostSpec};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Run with elevated privileges when the login user is not root
    pub sudo: bool,
}

impl ExecOptions {
    pub fn elevated() -> Self {
        Self { sudo: true }
    }
}

/// Execution collaborator for one host.
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// Short transport name used in log prefixes
    fn protocol(&self) -> &'static str;

    fn address(&self) -> &str;

    fn is_root(&self) -> bool;

    /// Run a command and return its trimmed standard output.
    async fn exec(&self, command: &RemoteCommand, opts: ExecOptions)
        -> Result<String, ConnectionError>;

    /// Copy a local file to `remote`.
    async fn upload(&self, local: &Path, remote: &str, opts: ExecOptions)
        -> Result<(), ConnectionError>;
}

/// Build the connection a host spec asks for.
pub fn connect(spec: &HostSpec) -> Arc<dyn Connection> {
    match spec.connection {
        ConnectionKind::Ssh => Arc::new(SshConnection::new(
            spec.address.clone(),
            spec.user.clone(),
            spec.port,
        )),
        ConnectionKind::Local => Arc::new(LocalConnection::new(spec.is_root())),
    }
}

/// Spawn a local process, feed it `stdin` and collect trimmed stdout.
pub(crate) async fn run_process(
    mut cmd: Command,
    stdin: Option<&str>,
    display: &str,
) -> Result<String, ConnectionError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|source| ConnectionError::Spawn { program, source })?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            // a command may exit without reading its input; its status tells more
            match pipe.write_all(input.as_bytes()).await {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
                _ => {}
            }
        }
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(ConnectionError::CommandFailed {
            command: display.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
