use crate::connection::{run_process, Connection, ConnectionError, ExecOptions, RemoteCommand};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

/// Connection through the system `ssh`/`scp` clients.
///
/// Authentication is left to the user's ssh configuration and agent.
#[derive(Debug, Clone)]
pub struct SshConnection {
    address: String,
    user: String,
    port: u16,
    options: Vec<String>,
}

impl SshConnection {
    pub fn new(address: impl Into<String>, user: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            user: user.into(),
            port,
            options: vec!["BatchMode=yes".to_string(), "ConnectTimeout=10".to_string()],
        }
    }

    /// Add an `-o key=value` option passed to both ssh and scp.
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }

    fn base_command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        for option in &self.options {
            cmd.arg("-o").arg(option);
        }
        cmd
    }

    async fn copy(&self, local: &Path, remote: &str) -> Result<(), ConnectionError> {
        let mut cmd = self.base_command("scp");
        cmd.arg("-q")
            .arg("-P")
            .arg(self.port.to_string())
            .arg(local)
            .arg(format!("{}:{}", self.destination(), remote));

        run_process(cmd, None, "scp")
            .await
            .map(|_| ())
            .map_err(|e| ConnectionError::Transfer {
                local: local.display().to_string(),
                remote: remote.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Connection for SshConnection {
    fn protocol(&self) -> &'static str {
        "ssh"
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn is_root(&self) -> bool {
        self.user == "root"
    }

    async fn exec(
        &self,
        command: &RemoteCommand,
        opts: ExecOptions,
    ) -> Result<String, ConnectionError> {
        let line = command.render_for(opts.sudo, self.is_root());

        let mut cmd = self.base_command("ssh");
        cmd.arg("-p")
            .arg(self.port.to_string())
            .arg(self.destination())
            .arg(&line);

        run_process(cmd, command.input(), &line).await
    }

    async fn upload(
        &self,
        local: &Path,
        remote: &str,
        opts: ExecOptions,
    ) -> Result<(), ConnectionError> {
        if !opts.sudo || self.is_root() {
            return self.copy(local, remote).await;
        }

        // scp cannot elevate, so stage in /tmp and install from there
        let staging = format!("/tmp/rustle-bootstrap-upload-{}", Uuid::new_v4().simple());
        self.copy(local, &staging).await?;

        let install = RemoteCommand::new("install").args([staging.as_str(), remote]);
        let result = self.exec(&install, ExecOptions::elevated()).await.map(|_| ());

        let cleanup = RemoteCommand::new("rm").args(["-f", staging.as_str()]);
        if let Err(e) = self.exec(&cleanup, ExecOptions::elevated()).await {
            debug!("{}: failed to remove {}: {}", self.address, staging, e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_detection() {
        assert!(SshConnection::new("10.0.0.1", "root", 22).is_root());
        assert!(!SshConnection::new("10.0.0.1", "ubuntu", 22).is_root());
    }

    #[test]
    fn test_destination() {
        let conn = SshConnection::new("node.example.com", "core", 2222);
        assert_eq!(conn.destination(), "core@node.example.com");
        assert_eq!(conn.address(), "node.example.com");
    }
}
