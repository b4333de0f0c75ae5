//! Combined EC2 + Batch control plane

use super::batch::{BatchClient, BatchOperations, ComputeEnvironmentParams, JobQueueParams};
use super::context::AwsContext;
use super::ec2::{Ec2Client, Ec2Operations, InstanceParams, LaunchTemplateParams};
use super::handle::ResourceHandle;
use anyhow::Result;

/// Everything the orchestrator needs to create, inspect and delete the
/// cluster's resources.
pub trait ComputeControlPlane: Ec2Operations + BatchOperations {}

impl<T: Ec2Operations + BatchOperations> ComputeControlPlane for T {}

/// The real control plane: EC2 and Batch clients sharing one AWS context
pub struct AwsControlPlane {
    pub ec2: Ec2Client,
    pub batch: BatchClient,
}

impl AwsControlPlane {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            ec2: Ec2Client::from_context(ctx),
            batch: BatchClient::from_context(ctx),
        }
    }
}

impl Ec2Operations for AwsControlPlane {
    async fn list_launch_templates(&self) -> Result<Vec<ResourceHandle>> {
        self.ec2.list_launch_templates().await
    }

    async fn create_launch_template(
        &self,
        name: &str,
        params: &LaunchTemplateParams,
    ) -> Result<ResourceHandle> {
        self.ec2.create_launch_template(name, params).await
    }

    async fn delete_launch_template(&self, name: &str) -> Result<()> {
        self.ec2.delete_launch_template(name).await
    }

    async fn find_instances(&self, name: &str) -> Result<Vec<ResourceHandle>> {
        self.ec2.find_instances(name).await
    }

    async fn launch_instance(&self, name: &str, params: &InstanceParams) -> Result<ResourceHandle> {
        self.ec2.launch_instance(name, params).await
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        self.ec2.terminate_instance(instance_id).await
    }

    async fn wait_for_terminated(&self, instance_id: &str) -> Result<()> {
        self.ec2.wait_for_terminated(instance_id).await
    }
}

impl BatchOperations for AwsControlPlane {
    async fn list_compute_environments(&self) -> Result<Vec<ResourceHandle>> {
        self.batch.list_compute_environments().await
    }

    async fn create_compute_environment(
        &self,
        name: &str,
        params: &ComputeEnvironmentParams,
        launch_template: &ResourceHandle,
    ) -> Result<ResourceHandle> {
        self.batch
            .create_compute_environment(name, params, launch_template)
            .await
    }

    async fn set_compute_environment_state(&self, name: &str, enabled: bool) -> Result<()> {
        self.batch.set_compute_environment_state(name, enabled).await
    }

    async fn delete_compute_environment(&self, name: &str) -> Result<()> {
        self.batch.delete_compute_environment(name).await
    }

    async fn list_job_queues(&self) -> Result<Vec<ResourceHandle>> {
        self.batch.list_job_queues().await
    }

    async fn create_job_queue(
        &self,
        name: &str,
        params: &JobQueueParams,
        compute_environment: &ResourceHandle,
    ) -> Result<ResourceHandle> {
        self.batch
            .create_job_queue(name, params, compute_environment)
            .await
    }

    async fn set_job_queue_state(&self, name: &str, enabled: bool) -> Result<()> {
        self.batch.set_job_queue_state(name, enabled).await
    }

    async fn delete_job_queue(&self, name: &str) -> Result<()> {
        self.batch.delete_job_queue(name).await
    }
}
