//! ValidateHosts reports every failing check of every host

#[cfg(test)]
mod validate_hosts_tests {
    use rustle_bootstrap::config::ConfigError;
    use rustle_bootstrap::configurer::{ConfigurerError, Linux};
    use rustle_bootstrap::connection::{CancelSignal, MockConnection};
    use rustle_bootstrap::phase::{Dispatcher, Phase, PhaseError, ValidateHosts};
    use rustle_bootstrap::types::{Cluster, Host, HostSpec};
    use std::sync::Arc;

    fn host(address: &str, hostname: &str, conn: MockConnection) -> Host {
        let mut h = Host::new(HostSpec::new(address), Arc::new(conn), CancelSignal::never());
        h.bind_configurer(Arc::new(Linux::default())).unwrap();
        h.metadata.hostname = hostname.to_string();
        h
    }

    async fn validate(cluster: &mut Cluster) -> Result<(), PhaseError> {
        let mut phase = ValidateHosts::default();
        phase.prepare(cluster)?;
        assert!(phase.should_run());
        phase.run(cluster, &Dispatcher::new(None)).await
    }

    #[tokio::test]
    async fn test_all_failures_are_reported() {
        let mut cluster = Cluster::new(
            "v1.29.2+k0s.0".parse().unwrap(),
            vec![
                host("10.0.0.1", "node1", MockConnection::new("10.0.0.1")),
                host("10.0.0.2", "node1", MockConnection::new("10.0.0.2")),
                host(
                    "10.0.0.3",
                    "host3",
                    MockConnection::new("10.0.0.3").deny_sudo(),
                ),
            ],
        );

        let err = validate(&mut cluster).await.unwrap_err();
        let PhaseError::Dispatch(dispatch) = err else {
            panic!("expected a dispatch error");
        };

        assert_eq!(dispatch.failures.len(), 3);
        assert_eq!(
            dispatch.hosts(),
            vec!["[mock] 10.0.0.1", "[mock] 10.0.0.2", "[mock] 10.0.0.3"]
        );

        for failure in &dispatch.failures[..2] {
            assert_eq!(failure.step, "unique hostname");
            assert!(matches!(
                &failure.error,
                PhaseError::Config(ConfigError::DuplicateHostname { hostname }) if hostname == "node1"
            ));
        }

        assert_eq!(dispatch.failures[2].step, "sudo");
        assert!(matches!(
            dispatch.failures[2].error,
            PhaseError::Configurer(ConfigurerError::PrivilegeUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_host_still_gets_privilege_check() {
        let dup = Arc::new(MockConnection::new("10.0.0.2"));
        let mut second = Host::new(HostSpec::new("10.0.0.2"), dup.clone(), CancelSignal::never());
        second.bind_configurer(Arc::new(Linux::default())).unwrap();
        second.metadata.hostname = "node1".to_string();

        let mut cluster = Cluster::new(
            "v1.29.2+k0s.0".parse().unwrap(),
            vec![
                host("10.0.0.1", "node1", MockConnection::new("10.0.0.1")),
                second,
            ],
        );

        validate(&mut cluster).await.unwrap_err();
        assert_eq!(dup.commands(), vec!["true".to_string()]);
        assert!(dup.history()[0].sudo);
    }

    #[tokio::test]
    async fn test_valid_hosts_pass() {
        let mut cluster = Cluster::new(
            "v1.29.2+k0s.0".parse().unwrap(),
            vec![
                host("10.0.0.1", "node1", MockConnection::new("10.0.0.1")),
                host("10.0.0.2", "node2", MockConnection::new("10.0.0.2")),
            ],
        );

        validate(&mut cluster).await.unwrap();
    }

    #[tokio::test]
    async fn test_unbound_host_fails_privilege_check() {
        let mut unbound = Host::new(
            HostSpec::new("10.0.0.1"),
            Arc::new(MockConnection::new("10.0.0.1")),
            CancelSignal::never(),
        );
        unbound.metadata.hostname = "node1".to_string();
        let mut cluster = Cluster::new("v1.29.2+k0s.0".parse().unwrap(), vec![unbound]);

        let err = validate(&mut cluster).await.unwrap_err();
        assert!(err.to_string().contains("no configurer bound"));
    }
}
