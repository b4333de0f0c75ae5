//! Batch operations trait for testing

use super::BatchClient;
use super::types::{ComputeEnvironmentParams, JobQueueParams};
use crate::aws::ResourceHandle;
use anyhow::Result;
use std::future::Future;

/// Batch half of the compute control plane.
pub trait BatchOperations: Send + Sync {
    /// List all compute environments
    fn list_compute_environments(
        &self,
    ) -> impl Future<Output = Result<Vec<ResourceHandle>>> + Send;

    /// Create a compute environment referencing a launch template
    fn create_compute_environment(
        &self,
        name: &str,
        params: &ComputeEnvironmentParams,
        launch_template: &ResourceHandle,
    ) -> impl Future<Output = Result<ResourceHandle>> + Send;

    /// Enable or disable a compute environment
    fn set_compute_environment_state(
        &self,
        name: &str,
        enabled: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete a compute environment
    fn delete_compute_environment(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// List all job queues
    fn list_job_queues(&self) -> impl Future<Output = Result<Vec<ResourceHandle>>> + Send;

    /// Create a job queue referencing a compute environment
    fn create_job_queue(
        &self,
        name: &str,
        params: &JobQueueParams,
        compute_environment: &ResourceHandle,
    ) -> impl Future<Output = Result<ResourceHandle>> + Send;

    /// Enable or disable a job queue
    fn set_job_queue_state(&self, name: &str, enabled: bool)
    -> impl Future<Output = Result<()>> + Send;

    /// Delete a job queue
    fn delete_job_queue(&self, name: &str) -> impl Future<Output = Result<()>> + Send;
}

impl BatchOperations for BatchClient {
    async fn list_compute_environments(&self) -> Result<Vec<ResourceHandle>> {
        BatchClient::list_compute_environments(self).await
    }

    async fn create_compute_environment(
        &self,
        name: &str,
        params: &ComputeEnvironmentParams,
        launch_template: &ResourceHandle,
    ) -> Result<ResourceHandle> {
        BatchClient::create_compute_environment(self, name, params, launch_template).await
    }

    async fn set_compute_environment_state(&self, name: &str, enabled: bool) -> Result<()> {
        BatchClient::set_compute_environment_state(self, name, enabled).await
    }

    async fn delete_compute_environment(&self, name: &str) -> Result<()> {
        BatchClient::delete_compute_environment(self, name).await
    }

    async fn list_job_queues(&self) -> Result<Vec<ResourceHandle>> {
        BatchClient::list_job_queues(self).await
    }

    async fn create_job_queue(
        &self,
        name: &str,
        params: &JobQueueParams,
        compute_environment: &ResourceHandle,
    ) -> Result<ResourceHandle> {
        BatchClient::create_job_queue(self, name, params, compute_environment).await
    }

    async fn set_job_queue_state(&self, name: &str, enabled: bool) -> Result<()> {
        BatchClient::set_job_queue_state(self, name, enabled).await
    }

    async fn delete_job_queue(&self, name: &str) -> Result<()> {
        BatchClient::delete_job_queue(self, name).await
    }
}
