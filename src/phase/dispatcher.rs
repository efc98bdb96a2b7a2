//! Bounded concurrent fan-out of host steps.

use crate::phase::{DispatchError, HostFailure, PhaseError};
use crate::types::Host;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use tracing::debug;

/// A unit of work applied to one host.
#[async_trait]
pub trait HostStep: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, host: &mut Host) -> Result<(), PhaseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Stop a host's chain at its first failing step
    ShortCircuit,
    /// Run every step regardless of earlier failures
    RunAll,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    concurrency: Option<usize>,
}

impl Dispatcher {
    /// `None` runs every host at once.
    pub fn new(concurrency: Option<usize>) -> Self {
        Self { concurrency }
    }

    pub fn concurrency(&self) -> Option<usize> {
        self.concurrency
    }

    /// Run `steps` in order on every host, stopping a host at its first failure.
    pub async fn parallel_do<'a, I>(
        &self,
        hosts: I,
        steps: &[&dyn HostStep],
    ) -> Result<(), DispatchError>
    where
        I: IntoIterator<Item = &'a mut Host>,
    {
        self.dispatch(hosts, steps, Mode::ShortCircuit).await
    }

    /// Run every step on every host and collect all failures.
    pub async fn parallel_check<'a, I>(
        &self,
        hosts: I,
        steps: &[&dyn HostStep],
    ) -> Result<(), DispatchError>
    where
        I: IntoIterator<Item = &'a mut Host>,
    {
        self.dispatch(hosts, steps, Mode::RunAll).await
    }

    async fn dispatch<'a, I>(
        &self,
        hosts: I,
        steps: &[&dyn HostStep],
        mode: Mode,
    ) -> Result<(), DispatchError>
    where
        I: IntoIterator<Item = &'a mut Host>,
    {
        let hosts: Vec<&mut Host> = hosts.into_iter().collect();
        if hosts.is_empty() {
            return Ok(());
        }

        let limit = self.concurrency.unwrap_or(hosts.len()).max(1);
        debug!(
            "dispatching {} step(s) to {} host(s), limit {}",
            steps.len(),
            hosts.len(),
            limit
        );

        // Boxed up front so the stream holds no closure over `&mut Host`,
        // which keeps the returned future `Send` for async-trait callers.
        let chains: Vec<BoxFuture<'_, (usize, Vec<HostFailure>)>> = hosts
            .into_iter()
            .enumerate()
            .map(|(index, host)| -> BoxFuture<'_, _> {
                Box::pin(async move { (index, run_chain(host, steps, mode).await) })
            })
            .collect();

        let mut outcomes: Vec<(usize, Vec<HostFailure>)> =
            stream::iter(chains).buffer_unordered(limit).collect().await;

        outcomes.sort_by_key(|(index, _)| *index);
        let failures: Vec<HostFailure> = outcomes
            .into_iter()
            .flat_map(|(_, failures)| failures)
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatchError { failures })
        }
    }
}

async fn run_chain(host: &mut Host, steps: &[&dyn HostStep], mode: Mode) -> Vec<HostFailure> {
    let mut failures = Vec::new();

    for step in steps {
        let result = if host.is_cancelled() {
            Err(PhaseError::Cancelled)
        } else {
            step.run(host).await
        };

        if let Err(error) = result {
            debug!("{}: {} failed: {}", host, step.name(), error);
            failures.push(HostFailure {
                host: host.to_string(),
                step: step.name().to_string(),
                error,
            });
            if mode == Mode::ShortCircuit {
                break;
            }
        }
    }

    failures
}
