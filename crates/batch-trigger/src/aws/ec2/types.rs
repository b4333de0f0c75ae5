//! EC2 request parameters

use serde::Serialize;

/// Parameters for the launch template used by Batch hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchTemplateParams {
    /// EC2 key pair name
    pub key_name: String,
    /// Raw user data (MIME multipart cloud-config); encoded by the client
    pub user_data: String,
    /// Version description recorded on the template
    pub description: String,
}

/// Parameters for the runner instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceParams {
    /// AMI to boot
    pub image_id: String,
    /// EC2 instance type (e.g., "t2.micro")
    pub instance_type: String,
    /// Bootstrap script (will be base64 encoded)
    pub user_data: String,
    /// Optional EC2 key pair name
    pub key_name: Option<String>,
    /// Optional IAM instance profile name
    pub instance_profile: Option<String>,
    /// Optional VPC subnet ID for the primary network interface
    pub subnet_id: Option<String>,
    /// Optional security group ID for the primary network interface
    pub security_group_id: Option<String>,
    /// Optional availability zone placement
    pub availability_zone: Option<String>,
    /// Job queue of the owning pipeline, recorded as a tag
    pub job_queue: Option<String>,
}

impl InstanceParams {
    /// Create instance parameters with required fields
    pub fn new(
        image_id: impl Into<String>,
        instance_type: impl Into<String>,
        user_data: impl Into<String>,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            instance_type: instance_type.into(),
            user_data: user_data.into(),
            key_name: None,
            instance_profile: None,
            subnet_id: None,
            security_group_id: None,
            availability_zone: None,
            job_queue: None,
        }
    }

    /// Set the EC2 key pair
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    /// Set the IAM instance profile name
    pub fn with_instance_profile(mut self, profile: impl Into<String>) -> Self {
        self.instance_profile = Some(profile.into());
        self
    }

    /// Set the VPC subnet ID
    pub fn with_subnet(mut self, subnet_id: impl Into<String>) -> Self {
        self.subnet_id = Some(subnet_id.into());
        self
    }

    /// Set the security group ID
    pub fn with_security_group(mut self, security_group_id: impl Into<String>) -> Self {
        self.security_group_id = Some(security_group_id.into());
        self
    }

    /// Set the availability zone
    pub fn with_availability_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zone = Some(zone.into());
        self
    }

    /// Record the owning job queue
    pub fn with_job_queue(mut self, job_queue: impl Into<String>) -> Self {
        self.job_queue = Some(job_queue.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_optional_fields() {
        let params = InstanceParams::new("ami-1", "t2.micro", "#!/bin/bash")
            .with_subnet("subnet-1")
            .with_security_group("sg-1")
            .with_instance_profile("role");

        assert_eq!(params.subnet_id.as_deref(), Some("subnet-1"));
        assert_eq!(params.security_group_id.as_deref(), Some("sg-1"));
        assert_eq!(params.instance_profile.as_deref(), Some("role"));
        assert!(params.key_name.is_none());
        assert!(params.availability_zone.is_none());
    }
}
