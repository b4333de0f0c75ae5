//! Teardown sequencer
//!
//! Decommissions the job queue, compute environment and launch template in
//! reverse dependency order. Every step is attempted; failures are recorded in
//! the report instead of aborting the sequence.

use super::descriptor::PipelinePlan;
use super::pipeline::PipelineState;
use crate::aws::{ComputeControlPlane, ignore_not_found};
use crate::clock::Clock;
use batch_trigger_common::ResourceKind;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// A resource to decommission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownTarget {
    pub kind: ResourceKind,
    pub name: String,
    /// False when the resource was never provisioned; it is then skipped
    pub provisioned: bool,
}

impl TeardownTarget {
    pub fn new(kind: ResourceKind, name: impl Into<String>, provisioned: bool) -> Self {
        Self {
            kind,
            name: name.into(),
            provisioned,
        }
    }

    /// Targets for the cluster resources of a run.
    ///
    /// A resource counts as provisioned when the pipeline holds a handle for it.
    pub fn from_run(plan: &PipelinePlan, state: &PipelineState) -> Vec<Self> {
        plan.steps()
            .iter()
            .filter(|step| step.kind() != ResourceKind::Instance)
            .map(|step| {
                let provisioned = state.handle(step.kind()).is_some();
                Self::new(step.kind(), &step.name, provisioned)
            })
            .collect()
    }
}

/// How a target ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TeardownStatus {
    Deleted,
    /// AWS reported the resource as already gone
    AlreadyDeleted,
    Failed(String),
    /// Never provisioned, nothing to do
    Skipped,
}

impl TeardownStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TeardownStatus::Deleted | TeardownStatus::AlreadyDeleted)
    }
}

/// Per-resource teardown result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownEntry {
    pub kind: ResourceKind,
    pub name: String,
    pub status: TeardownStatus,
}

/// Results of a teardown, one entry per target in the order handled
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownReport {
    pub entries: Vec<TeardownEntry>,
}

impl TeardownReport {
    pub fn successes(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TeardownEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, TeardownStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn entry(&self, kind: ResourceKind) -> Option<&TeardownEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let status = match &entry.status {
                TeardownStatus::Deleted => "deleted".to_string(),
                TeardownStatus::AlreadyDeleted => "already deleted".to_string(),
                TeardownStatus::Failed(reason) => format!("FAILED: {reason}"),
                TeardownStatus::Skipped => "skipped".to_string(),
            };
            writeln!(f, "  {:<20} {:<40} {}", entry.kind, entry.name, status)?;
        }
        Ok(())
    }
}

/// Best-effort, reverse-order decommissioning of the cluster resources
pub struct TeardownSequencer<'a, P, C> {
    plane: &'a P,
    clock: &'a C,
    settle: Duration,
}

impl<'a, P: ComputeControlPlane, C: Clock> TeardownSequencer<'a, P, C> {
    pub fn new(plane: &'a P, clock: &'a C, settle: Duration) -> Self {
        Self {
            plane,
            clock,
            settle,
        }
    }

    /// Decommission `targets`, queue first and launch template last.
    ///
    /// Instance targets are ignored; the runner is terminated by the watcher.
    #[instrument(skip_all, fields(targets = targets.len()))]
    pub async fn teardown(&self, targets: &[TeardownTarget]) -> TeardownReport {
        let mut ordered: Vec<&TeardownTarget> = targets
            .iter()
            .filter(|t| t.kind != ResourceKind::Instance)
            .collect();
        ordered.sort_by_key(|t| t.kind.teardown_priority());

        let mut report = TeardownReport::default();
        let mut settle_before_next = false;

        for target in ordered {
            if !target.provisioned {
                info!(kind = %target.kind, name = %target.name, "Not provisioned, skipping");
                report.entries.push(TeardownEntry {
                    kind: target.kind,
                    name: target.name.clone(),
                    status: TeardownStatus::Skipped,
                });
                continue;
            }

            if settle_before_next {
                self.settle().await;
            }

            let status = self.decommission(target).await;
            match &status {
                TeardownStatus::Failed(reason) => {
                    warn!(kind = %target.kind, name = %target.name, reason = %reason, "Teardown step failed")
                }
                _ => info!(kind = %target.kind, name = %target.name, "Decommissioned"),
            }

            // The compute environment stays referenced until the queue is fully gone
            settle_before_next = target.kind == ResourceKind::JobQueue;
            report.entries.push(TeardownEntry {
                kind: target.kind,
                name: target.name.clone(),
                status,
            });
        }

        report
    }

    async fn decommission(&self, target: &TeardownTarget) -> TeardownStatus {
        let name = target.name.as_str();

        if target.kind.requires_disable() {
            let disabled = match target.kind {
                ResourceKind::JobQueue => self.plane.set_job_queue_state(name, false).await,
                _ => self.plane.set_compute_environment_state(name, false).await,
            };
            match ignore_not_found(disabled) {
                Ok(true) => {}
                Ok(false) => return TeardownStatus::AlreadyDeleted,
                Err(e) => return TeardownStatus::Failed(format!("disable: {e:#}")),
            }
            self.settle().await;
        }

        let deleted = match target.kind {
            ResourceKind::JobQueue => self.plane.delete_job_queue(name).await,
            ResourceKind::ComputeEnvironment => self.plane.delete_compute_environment(name).await,
            _ => self.plane.delete_launch_template(name).await,
        };
        match ignore_not_found(deleted) {
            Ok(true) => TeardownStatus::Deleted,
            Ok(false) => TeardownStatus::AlreadyDeleted,
            Err(e) => TeardownStatus::Failed(format!("delete: {e:#}")),
        }
    }

    async fn settle(&self) {
        info!(delay_secs = self.settle.as_secs(), "Waiting for AWS to settle");
        self.clock.sleep(self.settle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let report = TeardownReport {
            entries: vec![
                TeardownEntry {
                    kind: ResourceKind::JobQueue,
                    name: "q".to_string(),
                    status: TeardownStatus::Failed("boom".to_string()),
                },
                TeardownEntry {
                    kind: ResourceKind::ComputeEnvironment,
                    name: "ce".to_string(),
                    status: TeardownStatus::Deleted,
                },
                TeardownEntry {
                    kind: ResourceKind::LaunchTemplate,
                    name: "lt".to_string(),
                    status: TeardownStatus::AlreadyDeleted,
                },
            ],
        };

        assert_eq!(report.successes(), 2);
        assert_eq!(report.failures().count(), 1);
        assert!(report.has_failures());
        assert!(report.to_string().contains("FAILED: boom"));
    }

    #[test]
    fn test_skipped_is_not_success() {
        assert!(!TeardownStatus::Skipped.is_success());
        assert!(TeardownReport::default().successes() == 0);
    }
}
