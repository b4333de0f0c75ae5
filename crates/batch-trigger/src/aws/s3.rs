//! S3 object checks for the completion marker

use crate::aws::context::AwsContext;
use anyhow::Result;
use aws_sdk_s3::{Client, error::SdkError};
use std::future::Future;
use tracing::debug;

/// Object storage capability used by the completion watcher.
pub trait ObjectStore: Send + Sync {
    /// Check whether `key` exists in `bucket`.
    ///
    /// A missing object is `Ok(false)`; any other failure is an error.
    fn exists(&self, bucket: &str, key: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// S3 client for checking workload output
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Create a new S3 client (loads AWS config from environment)
    pub async fn new(region: &str) -> Result<Self> {
        let ctx = AwsContext::new(region).await;
        Ok(Self::from_context(&ctx))
    }

    /// Create an S3 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
        }
    }

    /// Check whether an object exists using `HeadObject`
    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => {
                debug!(bucket = %bucket, key = %key, "Object exists");
                Ok(true)
            }
            Err(SdkError::ServiceError(e)) if e.err().is_not_found() => {
                debug!(bucket = %bucket, key = %key, "Object not found");
                Ok(false)
            }
            Err(e) => Err(anyhow::Error::from(e)
                .context(format!("Failed to check s3://{}/{}", bucket, key))),
        }
    }
}

impl ObjectStore for S3Client {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        S3Client::object_exists(self, bucket, key).await
    }
}
