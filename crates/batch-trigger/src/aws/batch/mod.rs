//! AWS Batch compute environment and job queue management

mod compute_environment;
mod job_queue;
mod operations;
mod types;

pub use operations::BatchOperations;
pub use types::{ComputeEnvironmentParams, JobQueueParams};

use crate::aws::context::AwsContext;
use anyhow::Result;
use aws_sdk_batch::Client;
use aws_sdk_batch::types::{CeStatus, JqStatus};

/// Batch client for compute environments and job queues
pub struct BatchClient {
    pub(crate) client: Client,
}

impl BatchClient {
    /// Create a new Batch client (loads AWS config from environment)
    pub async fn new(region: &str) -> Result<Self> {
        let ctx = AwsContext::new(region).await;
        Ok(Self::from_context(&ctx))
    }

    /// Create a Batch client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.batch_client(),
        }
    }
}

/// Normalize a Batch model accessor to `Option<&str>`.
///
/// Names and ARNs are required members on some Batch shapes and optional on
/// others.
pub(crate) fn text<'a>(value: impl Into<Option<&'a str>>) -> Option<&'a str> {
    value.into().filter(|s| !s.is_empty())
}

/// Batch keeps deleted compute environments listed for a while; those are gone
pub(crate) fn compute_environment_is_live(status: Option<&CeStatus>) -> bool {
    !matches!(status, Some(CeStatus::Deleting | CeStatus::Deleted))
}

/// Same as [`compute_environment_is_live`], for job queues
pub(crate) fn job_queue_is_live(status: Option<&JqStatus>) -> bool {
    !matches!(status, Some(JqStatus::Deleting | JqStatus::Deleted))
}
