//! Runner instance lifecycle operations

use super::types::InstanceParams;
use super::{Ec2Client, encode_user_data};
use crate::aws::ResourceHandle;
use crate::aws::error::classify_anyhow_error;
use crate::wait::{WaitConfig, wait_for_resource};
use anyhow::{Context, Result};
use aws_sdk_ec2::types::{
    Filter, InstanceNetworkInterfaceSpecification, InstanceStateName, InstanceType,
    Placement, ResourceType, Tag, TagSpecification,
};
use batch_trigger_common::ResourceKind;
use batch_trigger_common::defaults::DEFAULT_TERMINATION_WAIT_TIMEOUT_SECS;
use batch_trigger_common::tags::{self, TAG_CREATED_AT, TAG_JOB_QUEUE, TAG_NAME, TAG_TOOL, TAG_TOOL_VALUE};
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

impl Ec2Client {
    /// Find live (pending or running) instances carrying the given `Name` tag
    pub async fn find_instances(&self, name: &str) -> Result<Vec<ResourceHandle>> {
        let response = self
            .client
            .describe_instances()
            .filters(Filter::builder().name(format!("tag:{TAG_NAME}")).values(name).build())
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .values("pending")
                    .values("running")
                    .build(),
            )
            .send()
            .await
            .context("Failed to describe instances")?;

        let handles: Vec<ResourceHandle> = response
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .filter_map(|i| i.instance_id())
            .map(|id| ResourceHandle::new(ResourceKind::Instance, id, name))
            .collect();

        debug!(name = %name, count = handles.len(), "Found live instances");
        Ok(handles)
    }

    /// Launch the runner instance
    ///
    /// The instance gets a public IP on a delete-on-termination interface in
    /// the configured subnet, and is tagged with `name` so later runs can find it.
    pub async fn launch_instance(&self, name: &str, params: &InstanceParams) -> Result<ResourceHandle> {
        info!(
            name = %name,
            image_id = %params.image_id,
            instance_type = %params.instance_type,
            "Launching instance"
        );

        let created_at = tags::format_created_at(Utc::now());
        let mut tag_spec = TagSpecification::builder()
            .resource_type(ResourceType::Instance)
            .tags(Tag::builder().key(TAG_NAME).value(name).build())
            .tags(Tag::builder().key(TAG_TOOL).value(TAG_TOOL_VALUE).build())
            .tags(Tag::builder().key(TAG_CREATED_AT).value(&created_at).build());
        if let Some(queue) = &params.job_queue {
            tag_spec = tag_spec.tags(Tag::builder().key(TAG_JOB_QUEUE).value(queue).build());
        }

        let mut interface = InstanceNetworkInterfaceSpecification::builder()
            .associate_public_ip_address(true)
            .delete_on_termination(true)
            .device_index(0);
        if let Some(subnet) = &params.subnet_id {
            interface = interface.subnet_id(subnet);
        }
        if let Some(sg) = &params.security_group_id {
            interface = interface.groups(sg);
        }

        let mut request = self
            .client
            .run_instances()
            .image_id(&params.image_id)
            .instance_type(InstanceType::from(params.instance_type.as_str()))
            .min_count(1)
            .max_count(1)
            .user_data(encode_user_data(&params.user_data))
            .network_interfaces(interface.build())
            .tag_specifications(tag_spec.build());

        if let Some(key_name) = &params.key_name {
            request = request.key_name(key_name);
        }

        if let Some(profile) = &params.instance_profile {
            request = request.iam_instance_profile(
                aws_sdk_ec2::types::IamInstanceProfileSpecification::builder()
                    .name(profile)
                    .build(),
            );
        }

        if let Some(zone) = &params.availability_zone {
            request = request.placement(Placement::builder().availability_zone(zone).build());
        }

        let response = request.send().await.context("Failed to launch instance")?;

        let instance_id = response
            .instances()
            .first()
            .and_then(|i| i.instance_id())
            .context("No instance ID returned")?;

        info!(name = %name, instance_id = %instance_id, "Instance launched");
        Ok(ResourceHandle::new(ResourceKind::Instance, instance_id, name))
    }

    /// Terminate an instance
    pub async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        info!(instance_id = %instance_id, "Terminating instance");

        self.client
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .context("Failed to terminate instance")?;

        Ok(())
    }

    /// Wait for an instance to be fully terminated, using exponential backoff (2-15s)
    pub async fn wait_for_terminated(&self, instance_id: &str) -> Result<()> {
        wait_for_resource(
            WaitConfig {
                initial_delay: Duration::from_secs(2),
                max_delay: Duration::from_secs(15),
                timeout: Duration::from_secs(DEFAULT_TERMINATION_WAIT_TIMEOUT_SECS),
                jitter: 0.25,
            },
            None,
            || async {
                let response = self
                    .client
                    .describe_instances()
                    .instance_ids(instance_id)
                    .send()
                    .await;

                match response {
                    Ok(resp) => {
                        let state = resp
                            .reservations()
                            .first()
                            .and_then(|r| r.instances().first())
                            .and_then(|i| i.state())
                            .and_then(|s| s.name());

                        match state {
                            Some(InstanceStateName::Terminated) | None => {
                                debug!(instance_id = %instance_id, "Instance terminated");
                                Ok(true)
                            }
                            _ => Ok(false),
                        }
                    }
                    Err(e) => {
                        let err = anyhow::Error::from(e);
                        if classify_anyhow_error(&err).is_not_found() {
                            Ok(true)
                        } else {
                            warn!(instance_id = %instance_id, error = ?err, "Error checking instance state");
                            Ok(false)
                        }
                    }
                }
            },
            &format!("EC2 instance {} terminated", instance_id),
        )
        .await
    }
}
