//! Concurrency and failure aggregation of the host dispatcher

#[cfg(test)]
mod dispatcher_tests {
    use async_trait::async_trait;
    use rustle_bootstrap::connection::{CancelSignal, Canceller, MockConnection};
    use rustle_bootstrap::phase::{Dispatcher, HostStep, Phase, PhaseError};
    use rustle_bootstrap::types::{Cluster, Host, HostSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn hosts(count: usize, cancel: CancelSignal) -> Vec<Host> {
        (1..=count)
            .map(|i| {
                let address = format!("10.0.0.{i}");
                Host::new(
                    HostSpec::new(address.clone()),
                    Arc::new(MockConnection::new(address)),
                    cancel.clone(),
                )
            })
            .collect()
    }

    #[derive(Default)]
    struct Gauge {
        active: AtomicUsize,
        peak: AtomicUsize,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl HostStep for Gauge {
        fn name(&self) -> &str {
            "gauge"
        }

        async fn run(&self, _host: &mut Host) -> Result<(), PhaseError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails on hosts whose address is listed.
    struct FailOn {
        name: &'static str,
        addresses: Vec<&'static str>,
    }

    #[async_trait]
    impl HostStep for FailOn {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, host: &mut Host) -> Result<(), PhaseError> {
            if self.addresses.iter().any(|a| *a == host.address()) {
                return Err(PhaseError::NotBound {
                    host: host.to_string(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Record {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HostStep for Record {
        fn name(&self) -> &str {
            "record"
        }

        async fn run(&self, host: &mut Host) -> Result<(), PhaseError> {
            host.metadata.arch = "amd64".to_string();
            self.seen.lock().unwrap().push(host.address().to_string());
            Ok(())
        }
    }

    /// Stamps the arch of every host through the dispatcher, as real phases do.
    struct StampArch {
        record: Record,
    }

    #[async_trait]
    impl Phase for StampArch {
        fn title(&self) -> String {
            "Stamp arch".to_string()
        }

        async fn run(
            &mut self,
            cluster: &mut Cluster,
            dispatcher: &Dispatcher,
        ) -> Result<(), PhaseError> {
            let all: Vec<usize> = (0..cluster.hosts.len()).collect();
            dispatcher
                .parallel_do(cluster.select_mut(&all), &[&self.record])
                .await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_from_async_trait_phase() {
        let mut cluster = Cluster::new(
            "v1.29.2+k0s.0".parse().unwrap(),
            hosts(3, CancelSignal::never()),
        );
        let mut phase = StampArch {
            record: Record::default(),
        };

        phase
            .run(&mut cluster, &Dispatcher::new(Some(2)))
            .await
            .unwrap();

        assert_eq!(phase.record.seen.lock().unwrap().len(), 3);
        assert!(cluster.hosts.iter().all(|h| h.metadata.arch == "amd64"));
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_is_respected() {
        let mut hosts = hosts(6, CancelSignal::never());
        let gauge = Gauge::default();

        Dispatcher::new(Some(2))
            .parallel_do(hosts.iter_mut(), &[&gauge])
            .await
            .unwrap();

        assert_eq!(gauge.runs.load(Ordering::SeqCst), 6);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_unbounded_runs_every_host_at_once() {
        let mut hosts = hosts(5, CancelSignal::never());
        let gauge = Gauge::default();

        Dispatcher::new(None)
            .parallel_do(hosts.iter_mut(), &[&gauge])
            .await
            .unwrap();

        assert_eq!(gauge.peak.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_parallel_do_short_circuits_per_host() {
        let mut hosts = hosts(3, CancelSignal::never());
        let fail = FailOn {
            name: "preflight",
            addresses: vec!["10.0.0.2"],
        };
        let record = Record::default();

        let err = Dispatcher::new(None)
            .parallel_do(hosts.iter_mut(), &[&fail, &record])
            .await
            .unwrap_err();

        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].host, "[mock] 10.0.0.2");
        assert_eq!(err.failures[0].step, "preflight");

        let mut seen = record.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["10.0.0.1", "10.0.0.3"]);
        assert_eq!(hosts[1].metadata.arch, "");
        assert_eq!(hosts[2].metadata.arch, "amd64");
    }

    #[tokio::test]
    async fn test_parallel_check_runs_every_step() {
        let mut hosts = hosts(3, CancelSignal::never());
        let first = FailOn {
            name: "first",
            addresses: vec!["10.0.0.1", "10.0.0.3"],
        };
        let second = FailOn {
            name: "second",
            addresses: vec!["10.0.0.3"],
        };
        let record = Record::default();

        let err = Dispatcher::new(Some(1))
            .parallel_check(hosts.iter_mut(), &[&first, &second, &record])
            .await
            .unwrap_err();

        let failures: Vec<(String, String)> = err
            .failures
            .iter()
            .map(|f| (f.host.clone(), f.step.clone()))
            .collect();
        assert_eq!(
            failures,
            vec![
                ("[mock] 10.0.0.1".to_string(), "first".to_string()),
                ("[mock] 10.0.0.3".to_string(), "first".to_string()),
                ("[mock] 10.0.0.3".to_string(), "second".to_string()),
            ]
        );
        assert_eq!(record.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_host_set_succeeds() {
        let mut hosts: Vec<Host> = Vec::new();
        let record = Record::default();

        Dispatcher::new(Some(4))
            .parallel_do(hosts.iter_mut(), &[&record])
            .await
            .unwrap();
        assert!(record.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_hosts_run_no_steps() {
        let (canceller, signal) = Canceller::new();
        let mut hosts = hosts(2, signal);
        let record = Record::default();
        canceller.cancel();

        let err = Dispatcher::new(None)
            .parallel_do(hosts.iter_mut(), &[&record])
            .await
            .unwrap_err();

        assert_eq!(err.failures.len(), 2);
        assert!(err
            .failures
            .iter()
            .all(|f| matches!(f.error, PhaseError::Cancelled)));
        assert!(record.seen.lock().unwrap().is_empty());
    }
}
