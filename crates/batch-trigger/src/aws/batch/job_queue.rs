//! Batch job queue operations

use super::types::JobQueueParams;
use super::{BatchClient, job_queue_is_live, text};
use crate::aws::ResourceHandle;
use anyhow::{Context, Result};
use aws_sdk_batch::types::{ComputeEnvironmentOrder, JqState};
use batch_trigger_common::ResourceKind;
use tracing::{debug, info};

impl BatchClient {
    /// List the job queues in the region, leaving out deleted ones
    pub async fn list_job_queues(&self) -> Result<Vec<ResourceHandle>> {
        let mut handles = Vec::new();
        let mut next_token = None;

        loop {
            let mut request = self.client.describe_job_queues();
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }

            let response = request
                .send()
                .await
                .context("Failed to describe job queues")?;

            for queue in response.job_queues() {
                if !job_queue_is_live(queue.status()) {
                    debug!(name = ?queue.job_queue_name(), "Skipping deleted job queue");
                    continue;
                }
                if let (Some(arn), Some(name)) =
                    (text(queue.job_queue_arn()), text(queue.job_queue_name()))
                {
                    handles.push(ResourceHandle::new(ResourceKind::JobQueue, arn, name));
                }
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(count = handles.len(), "Listed job queues");
        Ok(handles)
    }

    /// Create an enabled job queue feeding `compute_environment`
    pub async fn create_job_queue(
        &self,
        name: &str,
        params: &JobQueueParams,
        compute_environment: &ResourceHandle,
    ) -> Result<ResourceHandle> {
        info!(
            name = %name,
            compute_environment = %compute_environment.name,
            priority = params.priority,
            "Creating job queue"
        );

        let order = ComputeEnvironmentOrder::builder()
            .order(params.order)
            .compute_environment(&compute_environment.id)
            .build()
            .context("Invalid compute environment order")?;

        let response = self
            .client
            .create_job_queue()
            .job_queue_name(name)
            .state(JqState::Enabled)
            .priority(params.priority)
            .compute_environment_order(order)
            .send()
            .await
            .context("Failed to create job queue")?;

        let arn = text(response.job_queue_arn()).context("No job queue ARN returned")?;

        info!(name = %name, arn = %arn, "Job queue created");
        Ok(ResourceHandle::new(ResourceKind::JobQueue, arn, name))
    }

    /// Enable or disable a job queue
    pub async fn set_job_queue_state(&self, name: &str, enabled: bool) -> Result<()> {
        let state = if enabled { JqState::Enabled } else { JqState::Disabled };
        info!(name = %name, state = %state.as_str(), "Updating job queue state");

        self.client
            .update_job_queue()
            .job_queue(name)
            .state(state)
            .send()
            .await
            .context("Failed to update job queue state")?;

        Ok(())
    }

    /// Delete a job queue (must be disabled first)
    pub async fn delete_job_queue(&self, name: &str) -> Result<()> {
        info!(name = %name, "Deleting job queue");

        self.client
            .delete_job_queue()
            .job_queue(name)
            .send()
            .await
            .context("Failed to delete job queue")?;

        Ok(())
    }
}
