//! Batch compute environment operations

use super::types::ComputeEnvironmentParams;
use super::{BatchClient, compute_environment_is_live, text};
use crate::aws::ResourceHandle;
use anyhow::{Context, Result};
use aws_sdk_batch::types::{
    CeState, CeType, ComputeResource, CrAllocationStrategy, CrType, LaunchTemplateSpecification,
};
use batch_trigger_common::ResourceKind;
use tracing::{debug, info};

/// Launch template version the compute environment tracks
const LAUNCH_TEMPLATE_VERSION: &str = "$Latest";

impl BatchClient {
    /// List the compute environments in the region, leaving out deleted ones
    pub async fn list_compute_environments(&self) -> Result<Vec<ResourceHandle>> {
        let mut handles = Vec::new();
        let mut next_token = None;

        loop {
            let mut request = self.client.describe_compute_environments();
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }

            let response = request
                .send()
                .await
                .context("Failed to describe compute environments")?;

            for env in response.compute_environments() {
                if !compute_environment_is_live(env.status()) {
                    debug!(name = ?env.compute_environment_name(), "Skipping deleted compute environment");
                    continue;
                }
                if let (Some(arn), Some(name)) = (
                    text(env.compute_environment_arn()),
                    text(env.compute_environment_name()),
                ) {
                    handles.push(ResourceHandle::new(ResourceKind::ComputeEnvironment, arn, name));
                }
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(count = handles.len(), "Listed compute environments");
        Ok(handles)
    }

    /// Create a managed EC2 compute environment backed by `launch_template`
    pub async fn create_compute_environment(
        &self,
        name: &str,
        params: &ComputeEnvironmentParams,
        launch_template: &ResourceHandle,
    ) -> Result<ResourceHandle> {
        info!(
            name = %name,
            launch_template = %launch_template.name,
            max_vcpus = params.max_vcpus,
            "Creating compute environment"
        );

        let template = LaunchTemplateSpecification::builder()
            .launch_template_name(&launch_template.name)
            .version(LAUNCH_TEMPLATE_VERSION)
            .build();

        let mut resources = ComputeResource::builder()
            .r#type(CrType::Ec2)
            .allocation_strategy(CrAllocationStrategy::from(params.allocation_strategy.as_str()))
            .minv_cpus(params.min_vcpus)
            .maxv_cpus(params.max_vcpus)
            .instance_role(&params.instance_role)
            .launch_template(template);
        for subnet in &params.subnets {
            resources = resources.subnets(subnet);
        }
        for sg in &params.security_group_ids {
            resources = resources.security_group_ids(sg);
        }
        for instance_type in &params.instance_types {
            resources = resources.instance_types(instance_type);
        }
        let resources = resources
            .build()
            .context("Invalid compute resource parameters")?;

        let response = self
            .client
            .create_compute_environment()
            .compute_environment_name(name)
            .r#type(CeType::Managed)
            .state(CeState::Enabled)
            .compute_resources(resources)
            .send()
            .await
            .context("Failed to create compute environment")?;

        let arn = text(response.compute_environment_arn())
            .context("No compute environment ARN returned")?;

        info!(name = %name, arn = %arn, "Compute environment created");
        Ok(ResourceHandle::new(ResourceKind::ComputeEnvironment, arn, name))
    }

    /// Enable or disable a compute environment
    pub async fn set_compute_environment_state(&self, name: &str, enabled: bool) -> Result<()> {
        let state = if enabled { CeState::Enabled } else { CeState::Disabled };
        info!(name = %name, state = %state.as_str(), "Updating compute environment state");

        self.client
            .update_compute_environment()
            .compute_environment(name)
            .state(state)
            .send()
            .await
            .context("Failed to update compute environment state")?;

        Ok(())
    }

    /// Delete a compute environment (must be disabled first)
    pub async fn delete_compute_environment(&self, name: &str) -> Result<()> {
        info!(name = %name, "Deleting compute environment");

        self.client
            .delete_compute_environment()
            .compute_environment(name)
            .send()
            .await
            .context("Failed to delete compute environment")?;

        Ok(())
    }
}
