//! Completion watcher
//!
//! Polls the completion marker until it appears, the deadline passes, the
//! marker becomes unreachable or the run is cancelled. Whichever way the loop
//! ends, the runner instance is terminated exactly once.

use crate::aws::{Ec2Operations, ObjectStore, ResourceHandle, ignore_not_found};
use crate::clock::{Clock, sleep_or_cancel};
use batch_trigger_common::CompletionMarker;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Result of watching a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum WatchOutcome {
    Pending,
    /// The marker appeared
    Completed,
    /// The deadline passed without the marker appearing
    TimedOut,
    /// Too many consecutive marker checks failed
    MarkerUnreachable,
    /// The run was cancelled
    Cancelled,
}

/// One watch of one runner instance
#[derive(Debug, Clone)]
pub struct WatchSession {
    pub instance: ResourceHandle,
    pub marker: CompletionMarker,
    pub deadline: Instant,
    pub poll_interval: Duration,
    /// Consecutive failed checks tolerated before giving up (0 = unlimited)
    pub max_consecutive_errors: u32,
    outcome: WatchOutcome,
}

impl WatchSession {
    pub fn new(
        instance: ResourceHandle,
        marker: CompletionMarker,
        deadline: Instant,
        poll_interval: Duration,
    ) -> Self {
        Self {
            instance,
            marker,
            deadline,
            poll_interval,
            max_consecutive_errors: 0,
            outcome: WatchOutcome::Pending,
        }
    }

    pub fn with_max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = max;
        self
    }

    pub fn outcome(&self) -> WatchOutcome {
        self.outcome
    }

    fn finish(&mut self, outcome: WatchOutcome) {
        debug_assert_eq!(self.outcome, WatchOutcome::Pending, "outcome already final");
        self.outcome = outcome;
    }
}

/// What happened during a watch
#[derive(Debug)]
pub struct WatchReport {
    pub outcome: WatchOutcome,
    /// Marker checks issued
    pub polls: u32,
    /// Result of the terminate call; never changes `outcome`
    pub termination: anyhow::Result<()>,
}

/// Watches the completion marker of a runner instance
pub struct CompletionWatcher<'a, E, S, C> {
    ec2: &'a E,
    store: &'a S,
    clock: &'a C,
    cancel: CancellationToken,
}

impl<'a, E: Ec2Operations, S: ObjectStore, C: Clock> CompletionWatcher<'a, E, S, C> {
    pub fn new(ec2: &'a E, store: &'a S, clock: &'a C, cancel: CancellationToken) -> Self {
        Self {
            ec2,
            store,
            clock,
            cancel,
        }
    }

    /// Poll until a terminal outcome, then terminate the instance.
    ///
    /// No check is issued once the deadline has passed, and a single failed
    /// check only counts towards the consecutive-error cap.
    #[instrument(skip_all, fields(instance_id = %session.instance.id, marker = %session.marker))]
    pub async fn watch(&self, session: &mut WatchSession) -> WatchReport {
        let mut polls = 0u32;
        let mut consecutive_errors = 0u32;

        let outcome = loop {
            if self.cancel.is_cancelled() {
                break WatchOutcome::Cancelled;
            }

            let now = self.clock.now();
            if now >= session.deadline {
                break WatchOutcome::TimedOut;
            }

            polls += 1;
            match self
                .store
                .exists(&session.marker.bucket, &session.marker.key)
                .await
            {
                Ok(true) => break WatchOutcome::Completed,
                Ok(false) => {
                    consecutive_errors = 0;
                    info!(poll = polls, "Workload not finished yet");
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(poll = polls, consecutive_errors, error = %e, "Marker check failed");
                    if session.max_consecutive_errors > 0
                        && consecutive_errors >= session.max_consecutive_errors
                    {
                        break WatchOutcome::MarkerUnreachable;
                    }
                }
            }

            let remaining = session.deadline.saturating_duration_since(self.clock.now());
            let pause = session.poll_interval.min(remaining);
            if !sleep_or_cancel(self.clock, pause, &self.cancel).await {
                break WatchOutcome::Cancelled;
            }
        };

        session.finish(outcome);
        match outcome {
            WatchOutcome::Completed => info!(polls, "Workload finished"),
            _ => warn!(polls, outcome = %outcome, "Workload did not signal completion"),
        }

        // The runner script terminates its own instance, so it may already be gone
        let termination = match ignore_not_found(
            self.ec2.terminate_instance(&session.instance.id).await,
        ) {
            Ok(true) => Ok(()),
            Ok(false) => {
                info!(instance_id = %session.instance.id, "Runner instance already gone");
                Ok(())
            }
            Err(e) => {
                error!(instance_id = %session.instance.id, error = %e, "Failed to terminate runner instance");
                Err(e)
            }
        };

        WatchReport {
            outcome,
            polls,
            termination,
        }
    }
}
