//! Pipeline driver: provisions the plan's resources in order

use super::descriptor::{PipelinePlan, ResourceDescriptor};
use super::provisioner::{ProvisionStatus, Provisioner, ProvisioningError};
use crate::aws::{ComputeControlPlane, ResourceHandle};
use crate::clock::{Clock, sleep_or_cancel};
use batch_trigger_common::ResourceKind;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Progress of one pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum StepStatus {
    Pending,
    Created,
    AlreadyExists,
    Failed,
}

impl From<ProvisionStatus> for StepStatus {
    fn from(status: ProvisionStatus) -> Self {
        match status {
            ProvisionStatus::Created => StepStatus::Created,
            ProvisionStatus::AlreadyExists => StepStatus::AlreadyExists,
        }
    }
}

/// One attempted step
#[derive(Debug)]
pub struct PipelineEntry {
    pub descriptor: ResourceDescriptor,
    pub handle: Option<ResourceHandle>,
    pub status: StepStatus,
    pub error: Option<ProvisioningError>,
}

/// Steps attempted so far, in order.
///
/// Entries are only ever appended; the newest entry is the only one whose
/// status still changes.
#[derive(Debug, Default)]
pub struct PipelineState {
    entries: Vec<PipelineEntry>,
}

impl PipelineState {
    pub fn entries(&self) -> &[PipelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handle of a provisioned resource of the given kind
    pub fn handle(&self, kind: ResourceKind) -> Option<&ResourceHandle> {
        self.entries
            .iter()
            .find(|e| e.descriptor.kind() == kind)
            .and_then(|e| e.handle.as_ref())
    }

    /// Handles gathered so far, in provisioning order
    pub fn handles(&self) -> Vec<ResourceHandle> {
        self.entries.iter().filter_map(|e| e.handle.clone()).collect()
    }

    /// The error that halted the pipeline, if any
    pub fn error(&self) -> Option<&ProvisioningError> {
        self.entries.last().and_then(|e| e.error.as_ref())
    }

    /// True once every step of `plan` has a handle
    pub fn is_complete(&self, plan: &PipelinePlan) -> bool {
        self.entries.len() == plan.steps().len()
            && self.entries.iter().all(|e| {
                matches!(e.status, StepStatus::Created | StepStatus::AlreadyExists)
            })
    }

    fn begin(&mut self, descriptor: ResourceDescriptor) {
        self.entries.push(PipelineEntry {
            descriptor,
            handle: None,
            status: StepStatus::Pending,
            error: None,
        });
    }

    fn finish(&mut self, handle: ResourceHandle, status: ProvisionStatus) {
        if let Some(entry) = self.entries.last_mut() {
            entry.handle = Some(handle);
            entry.status = status.into();
        }
    }

    fn fail(&mut self, error: ProvisioningError) {
        if let Some(entry) = self.entries.last_mut() {
            entry.status = StepStatus::Failed;
            entry.error = Some(error);
        }
    }
}

/// Kinds followed by a settle delay before the next step
fn settles_after(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::LaunchTemplate | ResourceKind::ComputeEnvironment
    )
}

/// Runs the provisioning steps of a plan in order, halting on the first error
pub struct PipelineDriver<'a, P, C> {
    provisioner: Provisioner<'a, P>,
    clock: &'a C,
    settle_delay: Duration,
    cancel: CancellationToken,
}

impl<'a, P: ComputeControlPlane, C: Clock> PipelineDriver<'a, P, C> {
    pub fn new(
        plane: &'a P,
        clock: &'a C,
        settle_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provisioner: Provisioner::new(plane),
            clock,
            settle_delay,
            cancel,
        }
    }

    /// Provision every step of `plan`.
    ///
    /// On failure the returned state ends with the failed step; later steps
    /// are never attempted and nothing is rolled back.
    #[instrument(skip_all)]
    pub async fn run(&self, plan: &PipelinePlan) -> PipelineState {
        let mut state = PipelineState::default();
        let mut pending_settle = false;

        for blueprint in plan.steps() {
            state.begin(blueprint.seal(state.handles()));

            if pending_settle {
                info!(delay_secs = self.settle_delay.as_secs(), "Waiting for AWS to settle");
                if !sleep_or_cancel(self.clock, self.settle_delay, &self.cancel).await {
                    state.fail(ProvisioningError::Cancelled {
                        kind: blueprint.kind(),
                        name: blueprint.name.clone(),
                    });
                    break;
                }
            } else if self.cancel.is_cancelled() {
                state.fail(ProvisioningError::Cancelled {
                    kind: blueprint.kind(),
                    name: blueprint.name.clone(),
                });
                break;
            }

            let descriptor = match state.entries.last() {
                Some(entry) => &entry.descriptor,
                None => break,
            };
            match self.provisioner.ensure(descriptor).await {
                Ok((handle, status)) => {
                    info!(resource = %handle, status = %status, "Step done");
                    state.finish(handle, status);
                    pending_settle = settles_after(blueprint.kind());
                }
                Err(e) => {
                    error!(kind = %blueprint.kind(), name = %blueprint.name, error = %e, "Provisioning failed");
                    state.fail(e);
                    break;
                }
            }
        }

        state
    }
}
