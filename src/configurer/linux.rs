use super::network::{default_route_interface, private_address, private_route_interface};
use super::{
    normalize_arch, Configurer, ConfigurerError, DefaultPaths, FlatcarPaths, PathProvider,
    RemoteStat, Result,
};
use crate::connection::{ConnectionError, ExecOptions, RemoteCommand};
use crate::types::{BinaryVersion, Host};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const RELEASE_BASE_URL: &str = "https://github.com/k0sproject/k0s/releases/download";
const LOCK_DIR: &str = "/run/lock";
const TOKEN_PLACEHOLDER: &str = "REPLACEME";

/// Configurer shared by every Linux distribution.
#[derive(Debug)]
pub struct Linux {
    name: &'static str,
    paths: Box<dyn PathProvider>,
}

impl Default for Linux {
    fn default() -> Self {
        Self::with_paths("linux", DefaultPaths)
    }
}

impl Linux {
    pub fn flatcar() -> Self {
        Self::with_paths("linux/flatcar", FlatcarPaths)
    }

    pub fn with_paths(name: &'static str, paths: impl PathProvider + 'static) -> Self {
        Self {
            name,
            paths: Box::new(paths),
        }
    }

    async fn run(&self, h: &Host, command: RemoteCommand, opts: ExecOptions) -> Result<String> {
        Ok(h.exec(&command, opts).await?)
    }

    async fn sudo(&self, h: &Host, command: RemoteCommand) -> Result<String> {
        self.run(h, command, ExecOptions::elevated()).await
    }

    /// Remove a temporary remote file. Failures are only logged.
    async fn release_temp(&self, h: &Host, path: &str) {
        if let Err(e) = self.delete_file(h, path).await {
            debug!("{}: failed to remove temporary file {}: {}", h, path, e);
        }
    }

    async fn fetch_and_install(
        &self,
        h: &Host,
        url: &str,
        tmp: &str,
        destination: &str,
        mode: &str,
    ) -> Result<()> {
        self.download_url(h, url, tmp, ExecOptions::default()).await?;

        let dir = parent_dir(destination);
        self.sudo(
            h,
            RemoteCommand::new("install").args([
                "-m",
                "0755",
                "-o",
                "root",
                "-g",
                "root",
                "-d",
                dir.as_str(),
            ]),
        )
        .await?;
        self.sudo(
            h,
            RemoteCommand::new("install")
                .args(["-m", mode, "-o", "root", "-g", "root", tmp, destination]),
        )
        .await?;

        Ok(())
    }

    async fn write_if_absent(&self, h: &Host, tmp: &str, path: &str, content: &str) -> Result<()> {
        self.sudo(h, RemoteCommand::new("cat").stdout_to(tmp).stdin(content))
            .await?;

        self.sudo(h, RemoteCommand::new("mv").args(["-n", tmp, path]))
            .await
            .map_err(|e| match e {
                ConfigurerError::Command(ConnectionError::Cancelled) => e,
                other => ConfigurerError::UpsertFailed {
                    path: path.to_string(),
                    reason: other.to_string(),
                },
            })?;

        // mv -n leaves the source in place when the target already exists
        match self
            .run(h, RemoteCommand::new("test").args(["-f", tmp]), ExecOptions::default())
            .await
        {
            Ok(_) => Err(ConfigurerError::UpsertConflict {
                path: path.to_string(),
            }),
            Err(e) if e.is_cancelled() => Err(e),
            Err(_) => Ok(()),
        }
    }

    async fn remote_digest(&self, h: &Host, remote: &str) -> Result<String> {
        let out = self
            .sudo(h, RemoteCommand::new("sha256sum").arg(remote))
            .await?;
        out.split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| ConfigurerError::InvalidOutput {
                operation: "sha256sum",
                output: out.clone(),
                reason: "empty output".to_string(),
            })
    }
}

/// Directory containing `path`, `/` for top-level entries.
pub fn parent_dir(path: &str) -> String {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().into_owned(),
        _ => "/".to_string(),
    }
}

async fn local_digest(path: &Path) -> std::io::Result<String> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<String> {
        let content = std::fs::read(path)?;
        Ok(format!("{:x}", Sha256::digest(&content)))
    })
    .await
    .map_err(std::io::Error::other)?
}

fn non_empty(operation: &'static str, output: String) -> Result<String> {
    if output.is_empty() {
        return Err(ConfigurerError::InvalidOutput {
            operation,
            output,
            reason: "empty output".to_string(),
        });
    }
    Ok(output)
}

#[async_trait]
impl Configurer for Linux {
    fn name(&self) -> &str {
        self.name
    }

    fn binary_path(&self) -> String {
        self.paths.binary_path().to_string()
    }

    fn config_path(&self) -> String {
        self.paths.config_path().to_string()
    }

    fn join_token_path(&self) -> String {
        self.paths.join_token_path().to_string()
    }

    fn binary_command(&self, args: &[&str]) -> RemoteCommand {
        RemoteCommand::new(self.binary_path()).args(args.iter().copied())
    }

    async fn kubeconfig_path(&self, h: &Host) -> String {
        let admin = self.paths.admin_kubeconfig_path();
        if self.file_exist(h, admin).await {
            admin.to_string()
        } else {
            self.paths.kubelet_kubeconfig_path().to_string()
        }
    }

    async fn kubectl_command(&self, h: &Host, args: &[&str]) -> RemoteCommand {
        let kubeconfig = self.kubeconfig_path(h).await;
        RemoteCommand::new("env")
            .arg(format!("KUBECONFIG={kubeconfig}"))
            .arg(self.binary_path())
            .arg("kubectl")
            .args(args.iter().copied())
    }

    async fn lock_file_path(&self, h: &Host) -> String {
        let has_lock_dir = self
            .run(
                h,
                RemoteCommand::new("test").args(["-d", LOCK_DIR]),
                ExecOptions::default(),
            )
            .await
            .is_ok();

        if has_lock_dir {
            format!("{LOCK_DIR}/rustle-bootstrap")
        } else {
            "/tmp/rustle-bootstrap.lock".to_string()
        }
    }

    async fn arch(&self, h: &Host) -> Result<String> {
        let raw = self
            .run(h, RemoteCommand::new("uname").arg("-m"), ExecOptions::default())
            .await?;
        Ok(normalize_arch(&non_empty("uname", raw)?))
    }

    async fn hostname(&self, h: &Host) -> Result<String> {
        let out = self
            .run(h, RemoteCommand::new("hostname"), ExecOptions::default())
            .await?;
        non_empty("hostname", out)
    }

    async fn binary_version(&self, h: &Host) -> Result<BinaryVersion> {
        let out = self.sudo(h, self.binary_command(&["version"])).await?;
        Ok(out.parse()?)
    }

    async fn check_privilege(&self, h: &Host) -> Result<()> {
        match self.sudo(h, RemoteCommand::new("true")).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => Err(ConfigurerError::PrivilegeUnavailable {
                reason: e.to_string(),
            }),
        }
    }

    async fn temp_file(&self, h: &Host) -> Result<String> {
        let out = self
            .run(h, RemoteCommand::new("mktemp"), ExecOptions::default())
            .await?;
        non_empty("mktemp", out)
    }

    async fn temp_dir(&self, h: &Host) -> Result<String> {
        let out = self
            .run(h, RemoteCommand::new("mktemp").arg("-d"), ExecOptions::default())
            .await?;
        non_empty("mktemp", out)
    }

    async fn download_url(
        &self,
        h: &Host,
        url: &str,
        destination: &str,
        opts: ExecOptions,
    ) -> Result<()> {
        debug!("{}: downloading {} to {}", h, url, destination);
        self.run(
            h,
            RemoteCommand::new("curl").args(["-sSLf", "-o", destination, url]),
            opts,
        )
        .await?;
        Ok(())
    }

    async fn install_artifact(
        &self,
        h: &Host,
        url: &str,
        destination: &str,
        mode: &str,
    ) -> Result<()> {
        let tmp = self.temp_file(h).await?;
        let result = self.fetch_and_install(h, url, &tmp, destination, mode).await;
        self.release_temp(h, &tmp).await;
        result
    }

    async fn download_binary(&self, h: &Host, version: &BinaryVersion, arch: &str) -> Result<()> {
        let url = format!("{RELEASE_BASE_URL}/{version}/k0s-{version}-{arch}");
        self.install_artifact(h, &url, &self.binary_path(), "0750")
            .await
    }

    async fn replace_token_path(&self, h: &Host, service_path: &str) -> Result<()> {
        let expr = format!("s^{}^{}^g", TOKEN_PLACEHOLDER, self.join_token_path());
        self.sudo(h, RemoteCommand::new("sed").args(["-i", expr.as_str(), service_path]))
            .await?;
        Ok(())
    }

    async fn file_exist(&self, h: &Host, path: &str) -> bool {
        self.sudo(h, RemoteCommand::new("test").args(["-e", path]))
            .await
            .is_ok()
    }

    async fn file_contains(&self, h: &Host, path: &str, needle: &str) -> bool {
        self.sudo(h, RemoteCommand::new("grep").args(["-q", needle, path]))
            .await
            .is_ok()
    }

    async fn stat(&self, h: &Host, path: &str) -> Result<Option<RemoteStat>> {
        let out = match self
            .sudo(h, RemoteCommand::new("stat").args(["-c", "%s %Y", path]))
            .await
        {
            Ok(out) => out,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                trace!("{}: stat {} failed: {}", h, path, e);
                return Ok(None);
            }
        };

        let invalid = |reason: &str| ConfigurerError::InvalidOutput {
            operation: "stat",
            output: out.clone(),
            reason: reason.to_string(),
        };

        let mut fields = out.split_whitespace();
        let size = fields
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| invalid("missing size"))?;
        let secs = fields
            .next()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| invalid("missing modification time"))?;
        let modified =
            DateTime::from_timestamp(secs, 0).ok_or_else(|| invalid("timestamp out of range"))?;

        Ok(Some(RemoteStat { size, modified }))
    }

    async fn file_changed(&self, h: &Host, local: &Path, remote: &str) -> bool {
        let local_meta = match tokio::fs::metadata(local).await {
            Ok(meta) => meta,
            Err(e) => {
                debug!("{}: cannot stat local {}: {}", h, local.display(), e);
                return true;
            }
        };

        let remote_stat = match self.stat(h, remote).await {
            Ok(Some(stat)) => stat,
            _ => return true,
        };

        if remote_stat.size != local_meta.len() {
            debug!("{}: {} size differs", h, remote);
            return true;
        }

        if let Ok(modified) = local_meta.modified() {
            let local_secs = DateTime::<Utc>::from(modified).timestamp();
            if local_secs == remote_stat.modified.timestamp() {
                return false;
            }
        }

        let local_sum = match local_digest(local).await {
            Ok(sum) => sum,
            Err(e) => {
                debug!("{}: cannot hash local {}: {}", h, local.display(), e);
                return true;
            }
        };

        match self.remote_digest(h, remote).await {
            Ok(remote_sum) => remote_sum != local_sum,
            Err(e) => {
                debug!("{}: cannot hash {}: {}", h, remote, e);
                true
            }
        }
    }

    async fn mkdir(&self, h: &Host, path: &str, opts: ExecOptions) -> Result<()> {
        self.run(h, RemoteCommand::new("mkdir").args(["-p", path]), opts)
            .await?;
        Ok(())
    }

    async fn chmod(&self, h: &Host, path: &str, mode: &str, opts: ExecOptions) -> Result<()> {
        self.run(h, RemoteCommand::new("chmod").args([mode, path]), opts)
            .await?;
        Ok(())
    }

    async fn touch(
        &self,
        h: &Host,
        path: &str,
        time: DateTime<Utc>,
        opts: ExecOptions,
    ) -> Result<()> {
        let stamp = format!("@{}", time.timestamp());
        self.run(
            h,
            RemoteCommand::new("touch").args(["-m", "-d", stamp.as_str(), path]),
            opts,
        )
        .await?;
        Ok(())
    }

    async fn move_file(&self, h: &Host, src: &str, dst: &str) -> Result<()> {
        self.sudo(h, RemoteCommand::new("mv").args([src, dst]))
            .await?;
        Ok(())
    }

    async fn delete_file(&self, h: &Host, path: &str) -> Result<()> {
        self.sudo(h, RemoteCommand::new("rm").args(["-f", path]))
            .await?;
        Ok(())
    }

    async fn delete_dir(&self, h: &Host, path: &str, opts: ExecOptions) -> Result<()> {
        self.run(h, RemoteCommand::new("rmdir").arg(path), opts)
            .await?;
        Ok(())
    }

    async fn upsert_file(&self, h: &Host, path: &str, content: &str) -> Result<()> {
        let tmp = self.temp_file(h).await?;
        let result = self.write_if_absent(h, &tmp, path, content).await;
        self.release_temp(h, &tmp).await;
        result
    }

    async fn http_status(&self, h: &Host, url: &str) -> Result<u16> {
        let out = self
            .run(
                h,
                RemoteCommand::new("curl").args(["-kso", "/dev/null", "-w", "%{http_code}", url]),
                ExecOptions::default(),
            )
            .await?;

        out.parse::<u16>()
            .map_err(|e| ConfigurerError::InvalidOutput {
                operation: "http status",
                output: out.clone(),
                reason: e.to_string(),
            })
    }

    async fn private_interface(&self, h: &Host) -> Result<String> {
        let scoped = RemoteCommand::new("ip")
            .args(["route", "list", "scope", "global"])
            .with_sbin_path();
        match self.run(h, scoped, ExecOptions::default()).await {
            Ok(routes) => {
                if let Some(iface) = private_route_interface(&routes) {
                    return Ok(iface);
                }
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => debug!("{}: listing global routes failed: {}", h, e),
        }

        let all = RemoteCommand::new("ip")
            .args(["route", "list"])
            .with_sbin_path();
        let routes = match self.run(h, all, ExecOptions::default()).await {
            Ok(routes) => routes,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                return Err(ConfigurerError::PrivateInterfaceNotFound {
                    reason: e.to_string(),
                })
            }
        };

        default_route_interface(&routes).ok_or_else(|| ConfigurerError::PrivateInterfaceNotFound {
            reason: "no private or default route".to_string(),
        })
    }

    async fn private_address(&self, h: &Host, iface: &str, public: &str) -> Result<String> {
        let cmd = RemoteCommand::new("ip")
            .args(["-o", "addr", "show", "dev", iface, "scope", "global"])
            .with_sbin_path();

        let listing = match self.run(h, cmd, ExecOptions::default()).await {
            Ok(listing) => listing,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                return Err(ConfigurerError::PrivateInterfaceLookup {
                    iface: iface.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        private_address(&listing, public).ok_or_else(|| ConfigurerError::PrivateAddressNotFound {
            iface: iface.to_string(),
        })
    }
}
