use crate::connection::{run_process, Connection, ConnectionError, ExecOptions, RemoteCommand};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Runs commands on the machine executing the pipeline via `sh -c`.
#[derive(Debug, Clone)]
pub struct LocalConnection {
    root: bool,
}

impl LocalConnection {
    pub fn new(root: bool) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Connection for LocalConnection {
    fn protocol(&self) -> &'static str {
        "local"
    }

    fn address(&self) -> &str {
        "localhost"
    }

    fn is_root(&self) -> bool {
        self.root
    }

    async fn exec(
        &self,
        command: &RemoteCommand,
        opts: ExecOptions,
    ) -> Result<String, ConnectionError> {
        let line = command.render_for(opts.sudo, self.root);

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&line);

        run_process(cmd, command.input(), &line).await
    }

    async fn upload(
        &self,
        local: &Path,
        remote: &str,
        opts: ExecOptions,
    ) -> Result<(), ConnectionError> {
        if opts.sudo && !self.root {
            let source = local.to_string_lossy();
            let install = RemoteCommand::new("install").args([source.as_ref(), remote]);
            return self.exec(&install, opts).await.map(|_| ());
        }

        tokio::fs::copy(local, remote)
            .await
            .map(|_| ())
            .map_err(|e| ConnectionError::Transfer {
                local: local.display().to_string(),
                remote: remote.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_exec_trims_output() {
        let conn = LocalConnection::new(false);
        let out = conn
            .exec(&RemoteCommand::new("echo").arg("hello"), ExecOptions::default())
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_exec_pipes_stdin_and_redirects() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out.txt");
        let conn = LocalConnection::new(false);

        let write = RemoteCommand::new("cat")
            .stdout_to(target.to_string_lossy())
            .stdin("piped content");
        conn.exec(&write, ExecOptions::default()).await.unwrap();

        let content = tokio::fs::read_to_string(&target).await.unwrap();
        assert_eq!(content, "piped content");
    }

    #[tokio::test]
    async fn test_failed_command_reports_exit_code() {
        let conn = LocalConnection::new(false);
        let err = conn
            .exec(&RemoteCommand::new("false"), ExecOptions::default())
            .await
            .unwrap_err();
        match err {
            ConnectionError::CommandFailed { code, .. } => assert_eq!(code, Some(1)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unread_stdin_keeps_exit_status() {
        let conn = LocalConnection::new(false);
        let input = "x".repeat(1 << 20);
        let err = conn
            .exec(&RemoteCommand::new("false").stdin(input), ExecOptions::default())
            .await
            .unwrap_err();
        match err {
            ConnectionError::CommandFailed { code, .. } => assert_eq!(code, Some(1)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_upload_copies_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.bin");
        let target = temp_dir.path().join("target.bin");
        tokio::fs::write(&source, b"binary").await.unwrap();

        let conn = LocalConnection::new(false);
        conn.upload(&source, &target.to_string_lossy(), ExecOptions::default())
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"binary");
    }
}
