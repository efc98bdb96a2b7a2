use crate::connection::CancelSignal;
use crate::phase::{
    DetectOs, Dispatcher, GatherFacts, Phase, PipelineError, UploadBinaries, ValidateHosts,
};
use crate::types::Cluster;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    /// Maximum number of hosts worked on at once, unbounded if `None`
    pub concurrency: Option<usize>,
}

/// Runs phases in order and aborts on the first failure.
pub struct Manager {
    config: ManagerConfig,
    phases: Vec<Box<dyn Phase>>,
    cancel: CancelSignal,
}

impl Manager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            phases: Vec::new(),
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn add_phase(&mut self, phase: impl Phase + 'static) {
        self.phases.push(Box::new(phase));
    }

    pub fn add_phases(&mut self, phases: impl IntoIterator<Item = Box<dyn Phase>>) {
        self.phases.extend(phases);
    }

    pub fn phase_titles(&self) -> Vec<String> {
        self.phases.iter().map(|p| p.title()).collect()
    }

    pub async fn run(&mut self, cluster: &mut Cluster) -> Result<(), PipelineError> {
        let dispatcher = Dispatcher::new(self.config.concurrency);

        for phase in self.phases.iter_mut() {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let title = phase.title();
            phase
                .prepare(cluster)
                .map_err(|source| PipelineError::Prepare {
                    phase: title.clone(),
                    source,
                })?;

            if !phase.should_run() {
                debug!("skipping phase: {}", title);
                continue;
            }

            info!("==> Running phase: {}", title);
            phase
                .run(cluster, &dispatcher)
                .await
                .map_err(|source| PipelineError::Phase {
                    phase: title.clone(),
                    source,
                })?;
        }

        Ok(())
    }
}

/// Phases run by `apply`, in order.
pub fn default_phases() -> Vec<Box<dyn Phase>> {
    vec![
        Box::new(DetectOs::default()),
        Box::new(GatherFacts::default()),
        Box::new(ValidateHosts::default()),
        Box::new(UploadBinaries::default()),
    ]
}
