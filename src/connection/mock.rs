//! In-memory host for exercising configurers and phases without a real machine.
//!
//! Understands the small set of coreutils commands the configurers issue
//! (`mktemp`, `cat`, `mv`, `test`, `install`, `stat`, ...) against a fake
//! filesystem. Anything else must be scripted with [`MockConnection::respond`]
//! or [`MockConnection::fail`], otherwise it fails like a missing program.

use crate::connection::{Connection, ConnectionError, ExecOptions, RemoteCommand};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFile {
    pub content: Vec<u8>,
    pub mode: u32,
    pub mtime: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRecord {
    /// Rendered command line without the sudo wrapper
    pub command: String,
    pub sudo: bool,
}

#[derive(Debug, Default)]
struct MockState {
    files: BTreeMap<String, MockFile>,
    dirs: BTreeSet<String>,
    responses: Vec<(String, Result<String, String>)>,
    downloads: BTreeMap<String, Vec<u8>>,
    history: Vec<ExecRecord>,
    uploads: Vec<(PathBuf, String)>,
    temp_counter: usize,
    deny_sudo: bool,
    clock: i64,
}

#[derive(Debug)]
pub struct MockConnection {
    address: String,
    root: bool,
    state: Mutex<MockState>,
}

type Outcome = Result<String, ConnectionError>;

impl MockConnection {
    pub fn new(address: impl Into<String>) -> Self {
        let mut state = MockState {
            clock: 1_700_000_000,
            ..MockState::default()
        };
        for dir in ["/", "/tmp", "/etc", "/usr", "/usr/local", "/var", "/var/lib", "/run"] {
            state.dirs.insert(dir.to_string());
        }

        Self {
            address: address.into(),
            root: false,
            state: Mutex::new(state),
        }
    }

    /// Log in as root, so no command is elevated.
    pub fn as_root(mut self) -> Self {
        self.root = true;
        self
    }

    /// Answer commands whose program and arguments start with `prefix`.
    pub fn respond(self, prefix: impl Into<String>, output: impl Into<String>) -> Self {
        self.lock()
            .responses
            .push((prefix.into(), Ok(output.into())));
        self
    }

    /// Fail commands whose program and arguments start with `prefix`.
    pub fn fail(self, prefix: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.lock()
            .responses
            .push((prefix.into(), Err(stderr.into())));
        self
    }

    pub fn with_file(self, path: impl Into<String>, content: impl AsRef<[u8]>) -> Self {
        self.put_file(path, content);
        self
    }

    pub fn with_dir(self, path: impl Into<String>) -> Self {
        let path: String = path.into();
        self.lock().mkdir_all(&path);
        self
    }

    /// Serve `content` to `curl -o` downloads of `url`.
    pub fn serve(self, url: impl Into<String>, content: impl AsRef<[u8]>) -> Self {
        self.lock()
            .downloads
            .insert(url.into(), content.as_ref().to_vec());
        self
    }

    /// Make every elevated command fail as if sudo wanted a password.
    pub fn deny_sudo(self) -> Self {
        self.lock().deny_sudo = true;
        self
    }

    pub fn put_file(&self, path: impl Into<String>, content: impl AsRef<[u8]>) {
        let mut state = self.lock();
        let mtime = state.tick();
        state.files.insert(
            path.into(),
            MockFile {
                content: content.as_ref().to_vec(),
                mode: 0o644,
                mtime,
            },
        );
    }

    pub fn file(&self, path: &str) -> Option<MockFile> {
        self.lock().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.lock().dirs.contains(path)
    }

    pub fn history(&self) -> Vec<ExecRecord> {
        self.lock().history.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .history
            .iter()
            .map(|r| r.command.clone())
            .collect()
    }

    pub fn uploads(&self) -> Vec<(PathBuf, String)> {
        self.lock().uploads.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MockState {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn mkdir_all(&mut self, path: &str) {
        let mut current = PathBuf::new();
        for component in Path::new(path).components() {
            current.push(component);
            self.dirs.insert(current.to_string_lossy().into_owned());
        }
    }

    fn parent_exists(&self, path: &str) -> bool {
        match Path::new(path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                self.dirs.contains(parent.to_string_lossy().as_ref())
            }
            _ => true,
        }
    }

    fn scripted(&self, argv: &str) -> Option<Result<String, String>> {
        self.responses
            .iter()
            .find(|(prefix, _)| argv.starts_with(prefix.as_str()))
            .map(|(_, outcome)| outcome.clone())
    }

    fn write(&mut self, path: &str, content: Vec<u8>, mode: u32) -> Result<(), String> {
        if !self.parent_exists(path) {
            return Err(format!("{path}: No such file or directory"));
        }
        let mtime = self.tick();
        self.files.insert(
            path.to_string(),
            MockFile {
                content,
                mode,
                mtime,
            },
        );
        Ok(())
    }

    fn run(&mut self, command: &RemoteCommand) -> Result<String, (Option<i32>, String)> {
        let args: Vec<&str> = command.arguments().iter().map(String::as_str).collect();

        match (command.program(), args.as_slice()) {
            ("true", _) => Ok(String::new()),
            ("mktemp", rest) => {
                self.temp_counter += 1;
                let path = format!("/tmp/tmp.mock{}", self.temp_counter);
                if rest.first() == Some(&"-d") {
                    self.dirs.insert(path.clone());
                } else {
                    self.write(&path, Vec::new(), 0o600).map_err(|e| (Some(1), e))?;
                }
                Ok(path)
            }
            ("cat", []) => match command.redirect() {
                Some(target) => {
                    let input = command.input().unwrap_or_default().as_bytes().to_vec();
                    self.write(target, input, 0o644).map_err(|e| (Some(1), e))?;
                    Ok(String::new())
                }
                None => Ok(command.input().unwrap_or_default().to_string()),
            },
            ("cat", [path]) => self
                .files
                .get(*path)
                .map(|f| String::from_utf8_lossy(&f.content).into_owned())
                .ok_or_else(|| missing(path)),
            ("mv", ["-n", src, dst]) => {
                if self.files.contains_key(*dst) {
                    return Ok(String::new());
                }
                self.rename(src, dst).map_err(|e| (Some(1), e))
            }
            ("mv", [src, dst]) => self.rename(src, dst).map_err(|e| (Some(1), e)),
            ("test", [flag, path]) => {
                let found = match *flag {
                    "-f" => self.files.contains_key(*path),
                    "-d" => self.dirs.contains(*path),
                    "-e" => self.files.contains_key(*path) || self.dirs.contains(*path),
                    _ => false,
                };
                if found {
                    Ok(String::new())
                } else {
                    Err((Some(1), String::new()))
                }
            }
            ("rm", ["-f", path]) => {
                self.files.remove(*path);
                Ok(String::new())
            }
            ("rmdir", [path]) => {
                if self.dirs.remove(*path) {
                    Ok(String::new())
                } else {
                    Err(missing(path))
                }
            }
            ("mkdir", ["-p", path]) => {
                self.mkdir_all(path);
                Ok(String::new())
            }
            ("chmod", [mode, path]) => {
                let mode = u32::from_str_radix(mode, 8)
                    .map_err(|_| (Some(1), format!("invalid mode: {mode}")))?;
                if self.dirs.contains(*path) {
                    return Ok(String::new());
                }
                let file = self.files.get_mut(*path).ok_or_else(|| missing(path))?;
                file.mode = mode;
                Ok(String::new())
            }
            ("touch", ["-m", "-d", stamp, path]) => {
                let secs = stamp
                    .strip_prefix('@')
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| (Some(1), format!("invalid date format '{stamp}'")))?;
                if !self.files.contains_key(*path) {
                    self.write(path, Vec::new(), 0o644).map_err(|e| (Some(1), e))?;
                }
                if let Some(file) = self.files.get_mut(*path) {
                    file.mtime = secs;
                }
                Ok(String::new())
            }
            ("stat", ["-c", "%s %Y", path]) => self
                .files
                .get(*path)
                .map(|f| format!("{} {}", f.content.len(), f.mtime))
                .ok_or_else(|| missing(path)),
            ("sha256sum", [path]) => self
                .files
                .get(*path)
                .map(|f| format!("{:x}  {path}", Sha256::digest(&f.content)))
                .ok_or_else(|| missing(path)),
            ("install", ["-m", _, "-o", _, "-g", _, "-d", dir]) => {
                self.mkdir_all(dir);
                Ok(String::new())
            }
            ("install", ["-m", mode, "-o", _, "-g", _, src, dst]) => {
                let mode = u32::from_str_radix(mode, 8)
                    .map_err(|_| (Some(1), format!("invalid mode: {mode}")))?;
                let content = self
                    .files
                    .get(*src)
                    .map(|f| f.content.clone())
                    .ok_or_else(|| missing(src))?;
                self.write(dst, content, mode).map_err(|e| (Some(1), e))?;
                Ok(String::new())
            }
            ("grep", ["-q", needle, path]) => {
                let file = self.files.get(*path).ok_or_else(|| (Some(2), String::new()))?;
                if String::from_utf8_lossy(&file.content).contains(needle) {
                    Ok(String::new())
                } else {
                    Err((Some(1), String::new()))
                }
            }
            ("curl", ["-sSLf", "-o", dest, url]) => {
                let content = self
                    .downloads
                    .get(*url)
                    .cloned()
                    .ok_or_else(|| (Some(22), "The requested URL returned error: 404".to_string()))?;
                self.write(dest, content, 0o644).map_err(|e| (Some(23), e))?;
                Ok(String::new())
            }
            ("sed", ["-i", expr, path]) => {
                let (from, to) = parse_substitution(expr)
                    .ok_or_else(|| (Some(1), format!("unsupported expression: {expr}")))?;
                let file = self.files.get_mut(*path).ok_or_else(|| missing(path))?;
                let replaced = String::from_utf8_lossy(&file.content).replace(&from, &to);
                file.content = replaced.into_bytes();
                Ok(String::new())
            }
            (program, _) => Err((Some(127), format!("{program}: command not found"))),
        }
    }

    fn rename(&mut self, src: &str, dst: &str) -> Result<String, String> {
        if !self.parent_exists(dst) {
            return Err(format!("{dst}: No such file or directory"));
        }
        let file = self
            .files
            .remove(src)
            .ok_or_else(|| format!("{src}: No such file or directory"))?;
        self.files.insert(dst.to_string(), file);
        Ok(String::new())
    }
}

fn missing(path: &str) -> (Option<i32>, String) {
    (Some(1), format!("{path}: No such file or directory"))
}

/// Parse `s<d>from<d>to<d>g` with any delimiter `<d>`.
fn parse_substitution(expr: &str) -> Option<(String, String)> {
    let mut chars = expr.chars();
    if chars.next()? != 's' {
        return None;
    }
    let delimiter = chars.next()?;
    let parts: Vec<&str> = chars.as_str().split(delimiter).collect();
    match parts.as_slice() {
        [from, to, _flags] => Some((from.to_string(), to.to_string())),
        _ => None,
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn protocol(&self) -> &'static str {
        "mock"
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn is_root(&self) -> bool {
        self.root
    }

    async fn exec(&self, command: &RemoteCommand, opts: ExecOptions) -> Outcome {
        let mut state = self.lock();
        let line = command.render();
        state.history.push(ExecRecord {
            command: line.clone(),
            sudo: opts.sudo,
        });

        if opts.sudo && !self.root && state.deny_sudo {
            return Err(ConnectionError::CommandFailed {
                command: command.render_for(true, false),
                code: Some(1),
                stderr: "sudo: a password is required".to_string(),
            });
        }

        if let Some(outcome) = state.scripted(&command.render_argv()) {
            return outcome.map_err(|stderr| ConnectionError::CommandFailed {
                command: line,
                code: Some(1),
                stderr,
            });
        }

        state
            .run(command)
            .map(|out| out.trim().to_string())
            .map_err(|(code, stderr)| ConnectionError::CommandFailed {
                command: line,
                code,
                stderr,
            })
    }

    async fn upload(
        &self,
        local: &Path,
        remote: &str,
        opts: ExecOptions,
    ) -> Result<(), ConnectionError> {
        let content = tokio::fs::read(local).await?;

        let mut state = self.lock();
        if opts.sudo && !self.root && state.deny_sudo {
            return Err(ConnectionError::Transfer {
                local: local.display().to_string(),
                remote: remote.to_string(),
                reason: "sudo: a password is required".to_string(),
            });
        }

        state
            .write(remote, content, 0o644)
            .map_err(|reason| ConnectionError::Transfer {
                local: local.display().to_string(),
                remote: remote.to_string(),
                reason,
            })?;
        state.uploads.push((local.to_path_buf(), remote.to_string()));
        Ok(())
    }
}
