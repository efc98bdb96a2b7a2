use std::fmt;

/// Locations that differ between distributions.
///
/// The shared [`Linux`](super::Linux) logic asks the provider for every path,
/// so a distribution only overrides what it actually changes.
pub trait PathProvider: Send + Sync + fmt::Debug {
    fn binary_path(&self) -> &str {
        "/usr/local/bin/k0s"
    }

    fn config_path(&self) -> &str {
        "/etc/k0s/k0s.yaml"
    }

    fn join_token_path(&self) -> &str {
        "/etc/k0s/k0stoken"
    }

    fn admin_kubeconfig_path(&self) -> &str {
        "/var/lib/k0s/pki/admin.conf"
    }

    fn kubelet_kubeconfig_path(&self) -> &str {
        "/var/lib/k0s/kubelet.conf"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPaths;

impl PathProvider for DefaultPaths {}

/// Flatcar mounts `/usr` read-only; binaries live under `/opt/bin`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatcarPaths;

impl PathProvider for FlatcarPaths {
    fn binary_path(&self) -> &str {
        "/opt/bin/k0s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatcar_only_moves_binary() {
        assert_eq!(FlatcarPaths.binary_path(), "/opt/bin/k0s");
        assert_eq!(FlatcarPaths.config_path(), DefaultPaths.config_path());
        assert_eq!(FlatcarPaths.join_token_path(), "/etc/k0s/k0stoken");
    }
}
