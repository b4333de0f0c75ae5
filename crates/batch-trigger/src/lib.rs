//! batch-trigger - transient AWS Batch cluster orchestrator
//!
//! Provisions a launch template, compute environment and job queue, launches a
//! runner instance whose bootstrap script executes a Nextflow workload, waits
//! for the workload's completion marker in S3, then terminates the instance and
//! tears the cluster back down.

pub mod aws;
pub mod clock;
pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod shutdown;
pub mod wait;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
