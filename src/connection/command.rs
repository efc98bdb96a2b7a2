//! Structured remote commands.
//!
//! Every primitive builds a [`RemoteCommand`] instead of formatting a shell
//! string, so quoting lives in one place and the command a primitive issues
//! can be asserted on in tests.

use std::fmt;

const SBIN_DIRS: [&str; 3] = ["/usr/local/sbin", "/usr/sbin", "/sbin"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    path_prefix: Vec<String>,
    stdout_to: Option<String>,
    stdin: Option<String>,
}

impl RemoteCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            path_prefix: Vec::new(),
            stdout_to: None,
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for this command only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Prepend the sbin directories to `$PATH`; non-login shells often lack them.
    pub fn with_sbin_path(mut self) -> Self {
        self.path_prefix = SBIN_DIRS.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Redirect standard output into `path` on the remote side.
    pub fn stdout_to(mut self, path: impl Into<String>) -> Self {
        self.stdout_to = Some(path.into());
        self
    }

    /// Pipe `input` to the command's standard input.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn input(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    pub fn redirect(&self) -> Option<&str> {
        self.stdout_to.as_deref()
    }

    /// Program and arguments only, quoted.
    pub fn render_argv(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| shell_words::quote(s).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Full shell line including environment and redirection.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();

        if !self.path_prefix.is_empty() {
            let dirs: Vec<String> = self
                .path_prefix
                .iter()
                .map(|d| shell_words::quote(d).into_owned())
                .collect();
            parts.push(format!("PATH={}:\"$PATH\"", dirs.join(":")));
        }

        for (key, value) in &self.env {
            parts.push(format!("{key}={}", shell_words::quote(value)));
        }

        parts.push(self.render_argv());

        if let Some(path) = &self.stdout_to {
            parts.push(format!("> {}", shell_words::quote(path)));
        }

        parts.join(" ")
    }

    /// Wrap the whole line in a non-interactive sudo shell. Stdin is kept.
    pub fn elevated(&self) -> RemoteCommand {
        RemoteCommand {
            program: "sudo".to_string(),
            args: vec![
                "-n".to_string(),
                "--".to_string(),
                "sh".to_string(),
                "-c".to_string(),
                self.render(),
            ],
            env: Vec::new(),
            path_prefix: Vec::new(),
            stdout_to: None,
            stdin: self.stdin.clone(),
        }
    }

    /// Line to hand to a shell for a user that is root or not.
    pub fn render_for(&self, sudo: bool, is_root: bool) -> String {
        if sudo && !is_root {
            self.elevated().render()
        } else {
            self.render()
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
