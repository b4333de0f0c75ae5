//! EC2 operations trait for testing

use super::Ec2Client;
use super::types::{InstanceParams, LaunchTemplateParams};
use crate::aws::ResourceHandle;
use anyhow::Result;
use std::future::Future;

/// EC2 half of the compute control plane.
///
/// Abstracts the EC2 client so the orchestrator can be unit tested without
/// hitting real AWS.
pub trait Ec2Operations: Send + Sync {
    /// List all launch templates
    fn list_launch_templates(&self) -> impl Future<Output = Result<Vec<ResourceHandle>>> + Send;

    /// Create a launch template
    fn create_launch_template(
        &self,
        name: &str,
        params: &LaunchTemplateParams,
    ) -> impl Future<Output = Result<ResourceHandle>> + Send;

    /// Delete a launch template by name
    fn delete_launch_template(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Find live instances with the given name
    fn find_instances(&self, name: &str)
    -> impl Future<Output = Result<Vec<ResourceHandle>>> + Send;

    /// Launch the runner instance
    fn launch_instance(
        &self,
        name: &str,
        params: &InstanceParams,
    ) -> impl Future<Output = Result<ResourceHandle>> + Send;

    /// Terminate an instance
    fn terminate_instance(&self, instance_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Wait for instance to be fully terminated
    fn wait_for_terminated(&self, instance_id: &str) -> impl Future<Output = Result<()>> + Send;
}

impl Ec2Operations for Ec2Client {
    async fn list_launch_templates(&self) -> Result<Vec<ResourceHandle>> {
        Ec2Client::list_launch_templates(self).await
    }

    async fn create_launch_template(
        &self,
        name: &str,
        params: &LaunchTemplateParams,
    ) -> Result<ResourceHandle> {
        Ec2Client::create_launch_template(self, name, params).await
    }

    async fn delete_launch_template(&self, name: &str) -> Result<()> {
        Ec2Client::delete_launch_template(self, name).await
    }

    async fn find_instances(&self, name: &str) -> Result<Vec<ResourceHandle>> {
        Ec2Client::find_instances(self, name).await
    }

    async fn launch_instance(&self, name: &str, params: &InstanceParams) -> Result<ResourceHandle> {
        Ec2Client::launch_instance(self, name, params).await
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        Ec2Client::terminate_instance(self, instance_id).await
    }

    async fn wait_for_terminated(&self, instance_id: &str) -> Result<()> {
        Ec2Client::wait_for_terminated(self, instance_id).await
    }
}
