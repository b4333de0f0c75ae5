//! EC2 launch template operations

use super::types::LaunchTemplateParams;
use super::{Ec2Client, encode_user_data};
use crate::aws::ResourceHandle;
use anyhow::{Context, Result};
use aws_sdk_ec2::types::RequestLaunchTemplateData;
use batch_trigger_common::ResourceKind;
use tracing::{debug, info};

impl Ec2Client {
    /// List every launch template in the region
    pub async fn list_launch_templates(&self) -> Result<Vec<ResourceHandle>> {
        let mut handles = Vec::new();
        let mut next_token = None;

        loop {
            let mut request = self.client.describe_launch_templates();
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }

            let response = request
                .send()
                .await
                .context("Failed to describe launch templates")?;

            for template in response.launch_templates() {
                if let (Some(id), Some(name)) = (
                    template.launch_template_id(),
                    template.launch_template_name(),
                ) {
                    handles.push(ResourceHandle::new(ResourceKind::LaunchTemplate, id, name));
                }
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(count = handles.len(), "Listed launch templates");
        Ok(handles)
    }

    /// Create a launch template with the given key pair and user data
    pub async fn create_launch_template(
        &self,
        name: &str,
        params: &LaunchTemplateParams,
    ) -> Result<ResourceHandle> {
        info!(name = %name, key_name = %params.key_name, "Creating launch template");

        let data = RequestLaunchTemplateData::builder()
            .key_name(&params.key_name)
            .user_data(encode_user_data(&params.user_data))
            .build();

        let response = self
            .client
            .create_launch_template()
            .launch_template_name(name)
            .version_description(&params.description)
            .launch_template_data(data)
            .send()
            .await
            .context("Failed to create launch template")?;

        let id = response
            .launch_template()
            .and_then(|t| t.launch_template_id())
            .context("No launch template ID returned")?;

        info!(name = %name, launch_template_id = %id, "Launch template created");
        Ok(ResourceHandle::new(ResourceKind::LaunchTemplate, id, name))
    }

    /// Delete a launch template by name
    pub async fn delete_launch_template(&self, name: &str) -> Result<()> {
        info!(name = %name, "Deleting launch template");

        self.client
            .delete_launch_template()
            .launch_template_name(name)
            .send()
            .await
            .context("Failed to delete launch template")?;

        Ok(())
    }
}
