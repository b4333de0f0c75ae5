//! EC2 launch template and runner instance management

mod instance;
mod launch_template;
mod operations;
mod types;

pub use operations::Ec2Operations;
pub use types::{InstanceParams, LaunchTemplateParams};

use crate::aws::context::AwsContext;
use anyhow::Result;
use aws_sdk_ec2::Client;

/// EC2 client for launch templates and the runner instance
pub struct Ec2Client {
    pub(crate) client: Client,
}

impl Ec2Client {
    /// Create a new EC2 client (loads AWS config from environment)
    pub async fn new(region: &str) -> Result<Self> {
        let ctx = AwsContext::new(region).await;
        Ok(Self::from_context(&ctx))
    }

    /// Create an EC2 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ec2_client(),
        }
    }
}

/// Base64-encode user data the way EC2 expects it
pub(crate) fn encode_user_data(user_data: &str) -> String {
    base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        user_data.as_bytes(),
    )
}
