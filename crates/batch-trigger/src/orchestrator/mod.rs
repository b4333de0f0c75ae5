//! Provisioning and lifecycle orchestration
//!
//! A run provisions the launch template, compute environment, job queue and
//! runner instance in that order, watches for the workload's completion
//! marker, terminates the runner and then tears the cluster down.

pub mod descriptor;
pub mod pipeline;
pub mod plan;
pub mod provisioner;
pub mod teardown;
pub mod user_data;
pub mod watcher;

pub use descriptor::{PipelinePlan, ResourceBlueprint, ResourceDescriptor, ResourceParams};
pub use pipeline::{PipelineDriver, PipelineEntry, PipelineState, StepStatus};
pub use plan::{RunPlan, build_plan};
pub use provisioner::{ProvisionStatus, Provisioner, ProvisioningError};
pub use teardown::{TeardownReport, TeardownSequencer, TeardownStatus, TeardownTarget};
pub use watcher::{CompletionWatcher, WatchOutcome, WatchReport, WatchSession};

use crate::aws::{ComputeControlPlane, ObjectStore};
use crate::clock::Clock;
use crate::config::{ConfigError, RunConfig};
use batch_trigger_common::ResourceKind;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Everything that happened during a run
#[derive(Debug)]
pub struct RunReport {
    pub pipeline: PipelineState,
    pub watch: Option<WatchReport>,
    /// Terminate call succeeded and the instance reached `terminated`
    pub termination_confirmed: bool,
    pub teardown: Option<TeardownReport>,
    /// Teardown deliberately skipped (`--keep`)
    pub kept: bool,
}

impl RunReport {
    /// Why the run counts as failed, or `None` if it fully succeeded
    pub fn failure(&self) -> Option<String> {
        if let Some(e) = self.pipeline.error() {
            return Some(format!("provisioning failed: {e}"));
        }

        let watch = self.watch.as_ref()?;
        if let Err(e) = &watch.termination {
            return Some(format!("failed to terminate the runner instance: {e:#}"));
        }
        if !self.termination_confirmed {
            return Some("runner instance termination was not confirmed; teardown skipped".into());
        }
        if watch.outcome != WatchOutcome::Completed {
            return Some(format!("workload did not complete: {}", watch.outcome));
        }

        if let Some(report) = &self.teardown {
            let failed: Vec<String> = report
                .failures()
                .map(|e| format!("{} {}", e.kind, e.name))
                .collect();
            if !failed.is_empty() {
                return Some(format!("teardown left resources behind: {}", failed.join(", ")));
            }
        }

        None
    }
}

/// Drives a whole run against a control plane, an object store and a clock
pub struct Orchestrator<'a, P, S, C> {
    plane: &'a P,
    store: &'a S,
    clock: &'a C,
    cancel: CancellationToken,
}

impl<'a, P, S, C> Orchestrator<'a, P, S, C>
where
    P: ComputeControlPlane,
    S: ObjectStore,
    C: Clock,
{
    pub fn new(plane: &'a P, store: &'a S, clock: &'a C, cancel: CancellationToken) -> Self {
        Self {
            plane,
            store,
            clock,
            cancel,
        }
    }

    /// Provision, watch, terminate and tear down.
    ///
    /// Only configuration errors are returned as `Err`; everything that
    /// happens once AWS is involved is recorded in the [`RunReport`].
    #[instrument(skip_all, fields(job_queue = %config.names.job_queue))]
    pub async fn run(&self, config: &RunConfig) -> Result<RunReport, ConfigError> {
        let plan = build_plan(config)?;

        let driver = PipelineDriver::new(
            self.plane,
            self.clock,
            config.timing.settle_delay,
            self.cancel.clone(),
        );
        let pipeline = driver.run(&plan.pipeline).await;

        let mut report = RunReport {
            pipeline,
            watch: None,
            termination_confirmed: false,
            teardown: None,
            kept: config.keep(),
        };

        if report.pipeline.error().is_some() {
            return Ok(report);
        }
        let Some(instance) = report.pipeline.handle(ResourceKind::Instance).cloned() else {
            return Ok(report);
        };

        info!(instance = %instance, marker = %plan.marker, "Workload started");

        let mut session = WatchSession::new(
            instance.clone(),
            plan.marker.clone(),
            self.clock.now() + config.timing.workload_timeout,
            config.timing.poll_interval,
        )
        .with_max_consecutive_errors(config.timing.max_consecutive_check_errors);

        let watcher = CompletionWatcher::new(self.plane, self.store, self.clock, self.cancel.clone());
        let watch = watcher.watch(&mut session).await;

        if watch.termination.is_ok() {
            match self.plane.wait_for_terminated(&instance.id).await {
                Ok(()) => report.termination_confirmed = true,
                Err(e) => error!(instance_id = %instance.id, error = %e, "Runner instance did not terminate"),
            }
        }
        report.watch = Some(watch);

        if !report.termination_confirmed {
            warn!("Skipping teardown, the runner instance may still be alive");
            return Ok(report);
        }
        if report.kept {
            info!("Keeping the cluster (--keep)");
            return Ok(report);
        }

        let targets = TeardownTarget::from_run(&plan.pipeline, &report.pipeline);
        let sequencer = TeardownSequencer::new(self.plane, self.clock, config.timing.teardown_settle);
        report.teardown = Some(sequencer.teardown(&targets).await);

        Ok(report)
    }
}

/// Names of leftover resources to decommission
#[derive(Debug, Clone, Default)]
pub struct LeftoverNames {
    pub job_queue: Option<String>,
    pub compute_environment: Option<String>,
    pub launch_template: Option<String>,
}

/// Tear down resources left behind by an earlier run.
///
/// Each name is looked up first; names that do not exist are reported as
/// skipped.
#[instrument(skip_all)]
pub async fn teardown_leftovers<P: ComputeControlPlane, C: Clock>(
    plane: &P,
    clock: &C,
    settle: std::time::Duration,
    names: &LeftoverNames,
) -> Result<TeardownReport, ProvisioningError> {
    let provisioner = Provisioner::new(plane);
    let requested = [
        (ResourceKind::JobQueue, &names.job_queue),
        (ResourceKind::ComputeEnvironment, &names.compute_environment),
        (ResourceKind::LaunchTemplate, &names.launch_template),
    ];

    let mut targets = Vec::new();
    for (kind, name) in requested {
        let Some(name) = name else { continue };
        let found = provisioner.lookup(kind, name).await?;
        if found.is_none() {
            info!(kind = %kind, name = %name, "Not found");
        }
        targets.push(TeardownTarget::new(kind, name, found.is_some()));
    }

    Ok(TeardownSequencer::new(plane, clock, settle)
        .teardown(&targets)
        .await)
}
